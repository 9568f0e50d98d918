//! linebridge — relay LINE group messages into a Slack channel.
//!
//! Shared by the `line2slack` CLI: config loading, the LINE and Slack clients,
//! the event dispatcher, and the webhook gateway.

pub mod config;
pub mod gateway;
pub mod line;
pub mod relay;
pub mod slack;
