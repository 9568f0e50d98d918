//! Event dispatcher: turn each LINE message event into one Slack post.
//!
//! Events are handled one at a time. Failures (identity lookup, content fetch, publish) are
//! logged and recorded in the [`BatchReport`]; they never stop the rest of the batch.

use crate::line::{Event, EventSource, EventType, LineApi, LineError, Message};
use crate::relay::outbound::{self, OutboundMessage, SenderIdentity, IMAGE_CONTENT_LIMIT};
use crate::slack::{SlackError, SlackPublisher};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("identity lookup failed: {0}")]
    IdentityLookup(LineError),
    #[error("content fetch failed: {0}")]
    ContentFetch(LineError),
    #[error("publish failed: {0}")]
    Publish(SlackError),
}

#[derive(Debug)]
pub enum EventOutcome {
    /// Not a message event, or a message variant that is not relayed.
    Skipped,
    /// Posted to Slack (the value is the outbound kind).
    Published(&'static str),
    Failed(DispatchError),
}

#[derive(Debug)]
pub struct EventReport {
    pub index: usize,
    /// LINE message kind, when the event carried a message.
    pub message_kind: Option<&'static str>,
    /// Lookups that failed; the affected name was left empty and the event still went out.
    pub identity_errors: Vec<DispatchError>,
    pub outcome: EventOutcome,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub events: Vec<EventReport>,
}

impl BatchReport {
    pub fn published(&self) -> usize {
        self.count(|o| matches!(o, EventOutcome::Published(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, EventOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EventOutcome::Failed(_)))
    }

    /// Events that went out with at least one empty identity field.
    pub fn partial_identity(&self) -> usize {
        self.events
            .iter()
            .filter(|e| !e.identity_errors.is_empty())
            .count()
    }

    fn count(&self, f: impl Fn(&EventOutcome) -> bool) -> usize {
        self.events.iter().filter(|e| f(&e.outcome)).count()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} event(s): {} published, {} skipped, {} failed, {} with partial identity",
            self.events.len(),
            self.published(),
            self.skipped(),
            self.failed(),
            self.partial_identity()
        )
    }
}

/// Successful lookups within one batch, so repeated senders are not fetched again.
#[derive(Default)]
struct IdentityCache {
    display_names: HashMap<(String, String), String>,
    group_names: HashMap<String, String>,
}

/// Relays LINE events to one Slack channel through injected clients.
pub struct Dispatcher {
    line: Arc<dyn LineApi>,
    slack: Arc<dyn SlackPublisher>,
    channel_id: String,
}

impl Dispatcher {
    pub fn new(
        line: Arc<dyn LineApi>,
        slack: Arc<dyn SlackPublisher>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            line,
            slack,
            channel_id: channel_id.into(),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Dispatch every event in order and report what happened to each.
    pub async fn dispatch_batch(&self, events: &[Event]) -> BatchReport {
        let mut cache = IdentityCache::default();
        let mut report = BatchReport::default();
        for (index, event) in events.iter().enumerate() {
            report
                .events
                .push(self.dispatch_event(index, event, &mut cache).await);
        }
        report
    }

    async fn dispatch_event(
        &self,
        index: usize,
        event: &Event,
        cache: &mut IdentityCache,
    ) -> EventReport {
        let message_kind = event.message.as_ref().map(Message::kind);
        let mut report = EventReport {
            index,
            message_kind,
            identity_errors: Vec::new(),
            outcome: EventOutcome::Skipped,
        };
        let message = match (event.kind, &event.message) {
            (EventType::Message, Some(m)) if *m != Message::Other => m,
            _ => {
                log::debug!(
                    "event {}: skipped ({:?}, message {:?})",
                    index,
                    event.kind,
                    message_kind
                );
                return report;
            }
        };

        let identity = self
            .resolve_identity(&event.source, cache, &mut report.identity_errors)
            .await;
        for e in &report.identity_errors {
            log::warn!("event {}: {}", index, e);
        }

        let outbound = match self.build_outbound(message, &identity).await {
            Ok(Some(m)) => m,
            Ok(None) => return report,
            Err(e) => {
                log::warn!("event {}: {}", index, e);
                report.outcome = EventOutcome::Failed(e);
                return report;
            }
        };

        log::debug!(
            "event {}: {} message -> slack {}",
            index,
            message.kind(),
            outbound.kind()
        );
        report.outcome = match self.slack.publish(&self.channel_id, &outbound).await {
            Ok(()) => EventOutcome::Published(outbound.kind()),
            Err(e) => {
                let e = DispatchError::Publish(e);
                log::warn!("event {}: {}", index, e);
                EventOutcome::Failed(e)
            }
        };
        report
    }

    /// Profile and group lookups are independent; each failure leaves its field empty.
    async fn resolve_identity(
        &self,
        source: &EventSource,
        cache: &mut IdentityCache,
        errors: &mut Vec<DispatchError>,
    ) -> SenderIdentity {
        let group_id = source.group_id.clone().unwrap_or_default();
        let user_id = source.user_id.clone().unwrap_or_default();
        let mut identity = SenderIdentity::default();

        let key = (group_id.clone(), user_id.clone());
        if let Some(name) = cache.display_names.get(&key) {
            identity.display_name = name.clone();
        } else {
            match self.line.group_member_profile(&group_id, &user_id).await {
                Ok(profile) => {
                    identity.display_name = profile.display_name.clone();
                    cache.display_names.insert(key, profile.display_name);
                }
                Err(e) => errors.push(DispatchError::IdentityLookup(e)),
            }
        }

        if let Some(name) = cache.group_names.get(&group_id) {
            identity.group_name = name.clone();
        } else {
            match self.line.group_summary(&group_id).await {
                Ok(summary) => {
                    identity.group_name = summary.group_name.clone();
                    cache.group_names.insert(group_id, summary.group_name);
                }
                Err(e) => errors.push(DispatchError::IdentityLookup(e)),
            }
        }
        identity
    }

    async fn build_outbound(
        &self,
        message: &Message,
        identity: &SenderIdentity,
    ) -> Result<Option<OutboundMessage>, DispatchError> {
        let out = match message {
            Message::Text { text, .. } => outbound::text_message(identity, text),
            Message::Sticker { sticker_id, .. } => outbound::sticker_message(identity, sticker_id),
            Message::Image { id } => {
                let content = self
                    .line
                    .message_content(id, Some(IMAGE_CONTENT_LIMIT))
                    .await
                    .map_err(DispatchError::ContentFetch)?;
                if content
                    .content_length
                    .is_some_and(|n| n > IMAGE_CONTENT_LIMIT as u64)
                {
                    log::warn!(
                        "image {} is {} bytes; only the first {} are relayed",
                        id,
                        content.content_length.unwrap_or_default(),
                        IMAGE_CONTENT_LIMIT
                    );
                }
                let filename = outbound::image_filename(id, content.content_type.as_deref());
                outbound::file_message(identity, content.data, filename, content.content_type)
            }
            Message::File { id, file_name, .. } => {
                let content = self
                    .line
                    .message_content(id, None)
                    .await
                    .map_err(DispatchError::ContentFetch)?;
                outbound::file_message(
                    identity,
                    content.data,
                    file_name.clone(),
                    content.content_type,
                )
            }
            Message::Other => return Ok(None),
        };
        Ok(Some(out))
    }
}
