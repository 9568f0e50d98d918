//! LINE side of the bridge: webhook decoding and the Messaging API client.

mod client;
mod webhook;

pub use client::{GroupSummary, LineApi, LineClient, LineError, MessageContent, Profile};
pub use webhook::{
    parse_request, sign_body, validate_signature, Event, EventSource, EventType, Message,
    WebhookBody, WebhookError, SIGNATURE_HEADER,
};
