//! Configuration types and loading.
//!
//! Config is loaded from a YAML file (`config.yml` in the working directory by default)
//! and environment. Keys are PascalCase (`LineChannelSecret`, `SlackToken`, ...).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config: LINE and Slack credentials plus listen address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// LINE Messaging API channel id. Informational; not used for any API call.
    #[serde(rename = "LineChannelID", default)]
    pub line_channel_id: String,

    /// LINE channel secret, used to verify `X-Line-Signature`. Overridden by LINE_CHANNEL_SECRET env.
    #[serde(default)]
    pub line_channel_secret: String,

    /// LINE channel access token for profile, summary and content calls. Overridden by LINE_CHANNEL_ACCESS_TOKEN env.
    #[serde(default)]
    pub line_channel_access_token: String,

    /// Slack bot token. Overridden by SLACK_TOKEN env.
    #[serde(default)]
    pub slack_token: String,

    /// Destination Slack channel id. Overridden by SLACK_CHANNEL_ID env.
    #[serde(default)]
    pub slack_channel_id: String,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,

    /// HTTP port (default 3000).
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            line_channel_id: String::new(),
            line_channel_secret: String::new(),
            line_channel_access_token: String::new(),
            slack_token: String::new(),
            slack_channel_id: String::new(),
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Apply LINE_CHANNEL_SECRET, LINE_CHANNEL_ACCESS_TOKEN, SLACK_TOKEN and SLACK_CHANNEL_ID
    /// over the file values. Empty or whitespace-only variables are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        override_from_env(&mut self.line_channel_secret, "LINE_CHANNEL_SECRET");
        override_from_env(&mut self.line_channel_access_token, "LINE_CHANNEL_ACCESS_TOKEN");
        override_from_env(&mut self.slack_token, "SLACK_TOKEN");
        override_from_env(&mut self.slack_channel_id, "SLACK_CHANNEL_ID");
        self
    }

    /// Socket address string for the gateway listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind.trim(), self.port)
    }
}

fn override_from_env(field: &mut String, var: &str) {
    if let Some(v) = pick_override(std::env::var(var).ok()) {
        *field = v;
    }
}

/// Trimmed env value, or None when unset or blank.
fn pick_override(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve config path from env or default (`config.yml` in the working directory).
pub fn default_config_path() -> PathBuf {
    std::env::var("LINEBRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yml"))
}

/// Load config from the given path (or the default). Missing file => warning and default config;
/// malformed YAML is an error. Env overrides are applied in both cases.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::warn!(
            "config file not found, continuing with empty credentials: {}",
            path.display()
        );
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        parse_config(&s).with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config.with_env_overrides(), path))
}

/// Parse YAML config text. An empty document yields the default config.
pub fn parse_config(s: &str) -> Result<Config> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}
