//! LINE Messaging API client: group member profile, group summary, message content.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::time::Duration;

const LINE_API_BASE: &str = "https://api.line.me";
const LINE_DATA_API_BASE: &str = "https://api-data.line.me";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("line request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("line api error: {0}")]
    Api(String),
    #[error("event source has no {0}")]
    MissingId(&'static str),
}

/// Group member profile (`GET /v2/bot/group/{groupId}/member/{userId}`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub picture_url: Option<String>,
}

/// Group summary (`GET /v2/bot/group/{groupId}/summary`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
}

/// Binary content of an image/file message, possibly truncated to the requested limit.
#[derive(Debug, Clone)]
pub struct MessageContent {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    /// Length announced by the server, before any truncation.
    pub content_length: Option<u64>,
}

/// Calls the dispatcher makes against LINE. Implemented by [`LineClient`]; tests use fakes.
#[async_trait]
pub trait LineApi: Send + Sync {
    async fn group_member_profile(&self, group_id: &str, user_id: &str)
        -> Result<Profile, LineError>;

    async fn group_summary(&self, group_id: &str) -> Result<GroupSummary, LineError>;

    /// Fetch message content. With `limit`, at most that many bytes are read and the rest is dropped.
    async fn message_content(
        &self,
        message_id: &str,
        limit: Option<usize>,
    ) -> Result<MessageContent, LineError>;
}

/// Client for the LINE Messaging API with a channel access token.
#[derive(Clone)]
pub struct LineClient {
    api_base: String,
    data_api_base: String,
    access_token: String,
    client: reqwest::Client,
}

impl LineClient {
    /// Base URLs default to the public LINE endpoints.
    pub fn new(
        access_token: impl Into<String>,
        api_base: Option<String>,
        data_api_base: Option<String>,
    ) -> Result<Self, LineError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            api_base: normalize_base(api_base, LINE_API_BASE),
            data_api_base: normalize_base(data_api_base, LINE_DATA_API_BASE),
            access_token: access_token.into(),
            client,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, LineError> {
        let res = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LineError::Api(format!("{} {} {}", url, status, body)));
        }
        Ok(res)
    }
}

fn normalize_base(base: Option<String>, default: &str) -> String {
    base.map(|u| u.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}

fn require_id<'a>(id: &'a str, what: &'static str) -> Result<&'a str, LineError> {
    if id.trim().is_empty() {
        Err(LineError::MissingId(what))
    } else {
        Ok(id)
    }
}

#[async_trait]
impl LineApi for LineClient {
    async fn group_member_profile(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<Profile, LineError> {
        let group_id = require_id(group_id, "group id")?;
        let user_id = require_id(user_id, "user id")?;
        let url = format!(
            "{}/v2/bot/group/{}/member/{}",
            self.api_base, group_id, user_id
        );
        Ok(self.get(&url).await?.json().await?)
    }

    async fn group_summary(&self, group_id: &str) -> Result<GroupSummary, LineError> {
        let group_id = require_id(group_id, "group id")?;
        let url = format!("{}/v2/bot/group/{}/summary", self.api_base, group_id);
        Ok(self.get(&url).await?.json().await?)
    }

    async fn message_content(
        &self,
        message_id: &str,
        limit: Option<usize>,
    ) -> Result<MessageContent, LineError> {
        let message_id = require_id(message_id, "message id")?;
        let url = format!(
            "{}/v2/bot/message/{}/content",
            self.data_api_base, message_id
        );
        let res = self.get(&url).await?;
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = res.content_length();

        let mut data = Vec::new();
        let mut stream = res.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !append_capped(&mut data, &chunk, limit) {
                log::debug!(
                    "line content {} truncated at {} bytes",
                    message_id,
                    data.len()
                );
                break;
            }
        }
        Ok(MessageContent {
            data,
            content_type,
            content_length,
        })
    }
}

/// Append `chunk` to `buf` without growing past `limit`. Returns false once the limit is hit
/// and further input would be dropped.
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], limit: Option<usize>) -> bool {
    match limit {
        None => {
            buf.extend_from_slice(chunk);
            true
        }
        Some(max) => {
            let room = max.saturating_sub(buf.len());
            if chunk.len() > room {
                buf.extend_from_slice(&chunk[..room]);
                false
            } else {
                buf.extend_from_slice(chunk);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_capped_without_limit_keeps_everything() {
        let mut buf = Vec::new();
        assert!(append_capped(&mut buf, b"abc", None));
        assert!(append_capped(&mut buf, b"def", None));
        assert_eq!(buf, b"abcdef");
    }

    #[test]
    fn append_capped_exact_fit_is_not_truncation() {
        let mut buf = Vec::new();
        assert!(append_capped(&mut buf, b"abcd", Some(4)));
        assert_eq!(buf, b"abcd");
    }

    #[test]
    fn append_capped_truncates_across_chunks() {
        let mut buf = Vec::new();
        assert!(append_capped(&mut buf, b"abc", Some(5)));
        assert!(!append_capped(&mut buf, b"defgh", Some(5)));
        assert_eq!(buf, b"abcde");
    }

    #[test]
    fn base_urls_are_normalized() {
        let client = LineClient::new(
            "token",
            Some("http://127.0.0.1:9000/".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(client.api_base, "http://127.0.0.1:9000");
        assert_eq!(client.data_api_base, LINE_DATA_API_BASE);
    }

    #[tokio::test]
    async fn missing_group_id_fails_without_request() {
        let client = LineClient::new("token", Some("http://127.0.0.1:9".to_string()), None).unwrap();
        let err = client.group_summary("").await.unwrap_err();
        assert!(matches!(err, LineError::MissingId("group id")));
        let err = client.group_member_profile("C1", " ").await.unwrap_err();
        assert!(matches!(err, LineError::MissingId("user id")));
    }
}
