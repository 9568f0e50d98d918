//! Slack Web API client: conversations.list, chat.postMessage and the external file upload flow.

use crate::relay::OutboundMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const SLACK_API_BASE: &str = "https://slack.com/api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LIST_PAGE_SIZE: u32 = 200;

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("slack request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("slack api error: {method}: {error}")]
    Api { method: String, error: String },
}

/// A channel returned by conversations.list.
#[derive(Debug, Clone, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ConversationsListResponse {
    #[serde(default)]
    channels: Vec<Conversation>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    upload_url: String,
    file_id: String,
}

/// Legacy message attachment; only the fields the bridge sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub text: String,
    pub image_url: String,
}

/// Posts one [`OutboundMessage`] to a channel. Implemented by [`SlackClient`]; tests use fakes.
#[async_trait]
pub trait SlackPublisher: Send + Sync {
    async fn publish(&self, channel_id: &str, message: &OutboundMessage) -> Result<(), SlackError>;
}

/// Client for the Slack Web API with a bot token.
#[derive(Clone)]
pub struct SlackClient {
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(token: impl Into<String>, api_base: Option<String>) -> Result<Self, SlackError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            api_base: api_base
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| SLACK_API_BASE.to_string()),
            token: token.into(),
            client,
        })
    }

    /// List every conversation visible to the bot, following pagination cursors.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, SlackError> {
        let mut out = Vec::new();
        let mut cursor = String::new();
        loop {
            let mut form = vec![("limit", LIST_PAGE_SIZE.to_string())];
            if !cursor.is_empty() {
                form.push(("cursor", cursor.clone()));
            }
            let value = self.call_form("conversations.list", &form).await?;
            let page: ConversationsListResponse = parse_response("conversations.list", value)?;
            out.extend(page.channels);
            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                return Ok(out);
            }
        }
    }

    /// chat.postMessage as the bot user, with either text or attachments.
    pub async fn post_message(
        &self,
        channel_id: &str,
        text: Option<&str>,
        attachments: &[Attachment],
    ) -> Result<(), SlackError> {
        let mut body = json!({ "channel": channel_id, "as_user": true });
        if let Some(t) = text {
            body["text"] = Value::String(t.to_string());
        }
        if !attachments.is_empty() {
            body["attachments"] = serde_json::to_value(attachments).unwrap_or(Value::Null);
        }
        self.call_json("chat.postMessage", &body).await?;
        Ok(())
    }

    /// Upload bytes to a channel: reserve an upload URL, send the bytes, then complete the upload
    /// with the initial comment. Returns the Slack file id.
    pub async fn upload_file(
        &self,
        channel_id: &str,
        data: &[u8],
        filename: &str,
        content_type: Option<&str>,
        initial_comment: &str,
    ) -> Result<String, SlackError> {
        let reserve = self
            .call_form(
                "files.getUploadURLExternal",
                &[
                    ("filename", filename.to_string()),
                    ("length", data.len().to_string()),
                ],
            )
            .await?;
        let reserve: UploadUrlResponse = parse_response("files.getUploadURLExternal", reserve)?;

        let res = self
            .client
            .post(&reserve.upload_url)
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(data.to_vec())
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(SlackError::Api {
                method: "file upload".to_string(),
                error: res.status().to_string(),
            });
        }

        let files = json!([{ "id": reserve.file_id, "title": filename }]).to_string();
        self.call_form(
            "files.completeUploadExternal",
            &[
                ("files", files),
                ("channel_id", channel_id.to_string()),
                ("initial_comment", initial_comment.to_string()),
            ],
        )
        .await?;
        Ok(reserve.file_id)
    }

    async fn call_json(&self, method: &str, body: &Value) -> Result<Value, SlackError> {
        let url = format!("{}/{}", self.api_base, method);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        check_ok(method, res.json().await?)
    }

    async fn call_form(&self, method: &str, form: &[(&str, String)]) -> Result<Value, SlackError> {
        let url = format!("{}/{}", self.api_base, method);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .form(form)
            .send()
            .await?;
        check_ok(method, res.json().await?)
    }
}

/// Slack reports failures as HTTP 200 with `"ok": false` and an `error` code.
fn check_ok(method: &str, value: Value) -> Result<Value, SlackError> {
    if value.get("ok").and_then(Value::as_bool) == Some(true) {
        Ok(value)
    } else {
        Err(SlackError::Api {
            method: method.to_string(),
            error: value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        })
    }
}

fn parse_response<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T, SlackError> {
    serde_json::from_value(value).map_err(|e| SlackError::Api {
        method: method.to_string(),
        error: format!("unexpected response: {}", e),
    })
}

#[async_trait]
impl SlackPublisher for SlackClient {
    async fn publish(&self, channel_id: &str, message: &OutboundMessage) -> Result<(), SlackError> {
        match message {
            OutboundMessage::Text { text } => self.post_message(channel_id, Some(text), &[]).await,
            OutboundMessage::Attachment { text, image_url } => {
                let attachment = Attachment {
                    text: text.clone(),
                    image_url: image_url.clone(),
                };
                self.post_message(channel_id, None, &[attachment]).await
            }
            OutboundMessage::File {
                data,
                filename,
                content_type,
                initial_comment,
            } => {
                let file_id = self
                    .upload_file(
                        channel_id,
                        data,
                        filename,
                        content_type.as_deref(),
                        initial_comment,
                    )
                    .await?;
                log::debug!("slack: uploaded {} as {}", filename, file_id);
                Ok(())
            }
        }
    }
}
