//! LINE webhook payload: signature check and event decoding.

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying base64(HMAC-SHA256(channel secret, body)).
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid channel secret: {0}")]
    InvalidKey(#[from] hmac::digest::InvalidLength),
    #[error("decoding webhook body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Webhook POST body: destination bot user id and a batch of events.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// One webhook event. Only `message` events carry a [`Message`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(default)]
    pub source: EventSource,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    Message,
    /// follow, join, postback, memberJoined, ...
    #[serde(other)]
    Other,
}

/// Where the event came from. Group chats carry both `group_id` and `user_id`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

/// Message payload variants relayed to Slack; everything else decodes to `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    #[serde(rename_all = "camelCase")]
    Text { id: String, text: String },
    #[serde(rename_all = "camelCase")]
    Sticker {
        id: String,
        #[serde(default)]
        package_id: String,
        sticker_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Image { id: String },
    #[serde(rename_all = "camelCase")]
    File {
        id: String,
        file_name: String,
        #[serde(default)]
        file_size: Option<u64>,
    },
    /// video, audio, location, ...
    #[serde(other)]
    Other,
}

impl Message {
    /// Short name for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Text { .. } => "text",
            Message::Sticker { .. } => "sticker",
            Message::Image { .. } => "image",
            Message::File { .. } => "file",
            Message::Other => "other",
        }
    }
}

fn keyed_mac(channel_secret: &str, body: &[u8]) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())?;
    mac.update(body);
    Ok(mac)
}

/// base64(HMAC-SHA256(secret, body)), the value LINE sends in [`SIGNATURE_HEADER`].
pub fn sign_body(channel_secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mac = keyed_mac(channel_secret, body)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a base64 signature against the body.
pub fn validate_signature(channel_secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    if decoded.is_empty() {
        return false;
    }
    let Ok(mac) = keyed_mac(channel_secret, body) else {
        return false;
    };
    mac.verify_slice(&decoded).is_ok()
}

/// Verify the signature header and decode the event batch.
/// A missing header counts as an invalid signature.
pub fn parse_request(
    channel_secret: &str,
    signature: Option<&str>,
    body: &[u8],
) -> Result<Vec<Event>, WebhookError> {
    let signature = signature.unwrap_or("");
    if !validate_signature(channel_secret, signature, body) {
        return Err(WebhookError::InvalidSignature);
    }
    let payload: WebhookBody = serde_json::from_slice(body)?;
    Ok(payload.events)
}
