//! Outbound message: what gets posted to Slack for one LINE message.

/// Image content is read up to this many bytes; anything beyond is dropped.
pub const IMAGE_CONTENT_LIMIT: usize = 1024 * 1024;

const STICKER_URL_PREFIX: &str = "https://stickershop.line-scdn.net/stickershop/v1/sticker/";

/// Resolved sender display name and group name. Empty when a lookup failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderIdentity {
    pub display_name: String,
    pub group_name: String,
}

impl SenderIdentity {
    /// `[group] sender:` prefix put in front of every relayed message.
    pub fn prefix(&self) -> String {
        format!("[{}] {}:", self.group_name, self.display_name)
    }
}

/// A message ready for the Slack publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Plain text, posted as the bot user.
    Text { text: String },
    /// Attachment with an image URL (stickers).
    Attachment { text: String, image_url: String },
    /// Uploaded file with the prefix as initial comment.
    File {
        data: Vec<u8>,
        filename: String,
        content_type: Option<String>,
        initial_comment: String,
    },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Text { .. } => "text",
            OutboundMessage::Attachment { .. } => "attachment",
            OutboundMessage::File { .. } => "file",
        }
    }
}

pub fn text_message(identity: &SenderIdentity, text: &str) -> OutboundMessage {
    OutboundMessage::Text {
        text: format!("{}\n{}", identity.prefix(), text),
    }
}

pub fn sticker_message(identity: &SenderIdentity, sticker_id: &str) -> OutboundMessage {
    OutboundMessage::Attachment {
        text: identity.prefix(),
        image_url: sticker_url(sticker_id),
    }
}

pub fn sticker_url(sticker_id: &str) -> String {
    format!("{}{}/android/sticker.png", STICKER_URL_PREFIX, sticker_id)
}

/// File upload for a LINE image or file message.
pub fn file_message(
    identity: &SenderIdentity,
    data: Vec<u8>,
    filename: String,
    content_type: Option<String>,
) -> OutboundMessage {
    OutboundMessage::File {
        data,
        filename,
        content_type,
        initial_comment: identity.prefix(),
    }
}

/// LINE image messages have no file name; derive one from the message id and content type.
pub fn image_filename(message_id: &str, content_type: Option<&str>) -> String {
    let ext = match content_type
        .map(|c| c.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("image/jpeg") | Some("image/jpg") => "jpg",
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        _ => "bin",
    };
    format!("line-image-{}.{}", message_id, ext)
}
