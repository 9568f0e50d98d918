//! Relay core: map decoded LINE events to Slack posts.

mod dispatcher;
mod outbound;

pub use dispatcher::{BatchReport, DispatchError, Dispatcher, EventOutcome, EventReport};
pub use outbound::{
    image_filename, sticker_url, OutboundMessage, SenderIdentity, IMAGE_CONTENT_LIMIT,
};
