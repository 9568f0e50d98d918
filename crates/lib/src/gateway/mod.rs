//! Gateway: HTTP server receiving LINE webhooks.
//!
//! Single port; `GET /` answers a liveness string and `POST /line_callback` relays the
//! signed event batch to Slack before responding.

mod server;

pub use server::{log_conversations, router, run_gateway, GatewayState};
