//! Gateway HTTP server: liveness route and the LINE webhook receiver.

use crate::config::Config;
use crate::line::{self, LineApi, LineClient, WebhookError};
use crate::relay::Dispatcher;
use crate::slack::{SlackClient, SlackPublisher};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    trace::{DefaultOnResponse, TraceLayer},
};

/// Shared state for the gateway: immutable config and the dispatcher holding both API clients.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
}

impl GatewayState {
    /// Build state from explicit client handles (real clients in `run_gateway`, fakes in tests).
    pub fn new(
        config: Config,
        line: Arc<dyn LineApi>,
        slack: Arc<dyn SlackPublisher>,
    ) -> Self {
        let dispatcher = Dispatcher::new(line, slack, config.slack_channel_id.clone());
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Routes: `GET /` and `POST /line_callback`, with a per-request access log and
/// panic recovery (a panicking handler answers 500 and the server keeps serving).
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/line_callback", post(line_callback))
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
}

/// Log every conversation visible to the Slack bot. Failures are logged; startup continues.
pub async fn log_conversations(slack: &SlackClient) {
    match slack.list_conversations().await {
        Ok(list) => {
            for c in &list {
                log::info!("ID: {}, Name: {}", c.id, c.name);
            }
            log::info!("slack: {} conversation(s) visible", list.len());
        }
        Err(e) => log::warn!("slack conversations.list failed: {}", e),
    }
}

/// Run the gateway until SIGINT/SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    if config.line_channel_secret.is_empty() {
        log::warn!("LineChannelSecret is empty; every webhook request will fail signature checks");
    }
    if config.slack_channel_id.is_empty() {
        log::warn!("SlackChannelId is empty; posts to Slack will be rejected");
    }

    let line_client = LineClient::new(config.line_channel_access_token.clone(), None, None)
        .context("building LINE client")?;
    log::info!("line client ready");
    let slack_client =
        SlackClient::new(config.slack_token.clone(), None).context("building Slack client")?;
    log_conversations(&slack_client).await;

    let bind_addr = config.bind_addr();
    let state = GatewayState::new(config, Arc::new(line_client), Arc::new(slack_client));
    log::info!(
        "relaying LINE events to slack channel {}",
        state.dispatcher.channel_id()
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / — liveness placeholder.
async fn hello() -> &'static str {
    "Hello, World!"
}

/// POST /line_callback — verify the signature, decode the batch, relay each event.
/// Per-event failures do not change the response; only decode failures do.
async fn line_callback(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = headers
        .get(line::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let events = match line::parse_request(&state.config.line_channel_secret, signature, &body) {
        Ok(events) => events,
        Err(WebhookError::InvalidSignature) => {
            log::warn!("line callback: invalid signature");
            return (StatusCode::BAD_REQUEST, "Bad Request");
        }
        Err(e) => {
            log::error!("line callback: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };
    let report = state.dispatcher.dispatch_batch(&events).await;
    log::info!("line callback: {}", report);
    (StatusCode::OK, "ok")
}
