//! Slack side of the bridge: Web API client and the publisher seam used by the dispatcher.

mod client;

pub use client::{Attachment, Conversation, SlackClient, SlackError, SlackPublisher};
