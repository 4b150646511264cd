//! Connection handlers for the Courier server.
//!
//! This module owns the connection lifecycle: upgrade, the per-connection
//! event loop, and teardown. Each connection gets one task that alternates
//! between draining its outbound mailbox and processing inbound frames, so
//! a session's events are handled strictly in receipt order.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use courier_core::{ConnectionId, ConnectionSession, RoomRegistry, TimerRegistry};
use courier_protocol::{codec, Inbound, ProtocolError, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::auth::{StaticTokenVerifier, TokenVerifier};
use crate::config::Config;
use crate::events;
use crate::metrics::{self, ConnectionMetricsGuard};

/// Shared server state.
pub struct AppState {
    /// Room membership and fan-out.
    pub registry: RoomRegistry,
    /// Pending typing-expiry timers.
    pub timers: TimerRegistry,
    /// Identity verification capability.
    pub verifier: Box<dyn TokenVerifier>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create app state with the built-in static verifier.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_verifier(config, Box::new(StaticTokenVerifier))
    }

    /// Create app state with a custom identity verifier.
    #[must_use]
    pub fn with_verifier(config: Config, verifier: Box<dyn TokenVerifier>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            timers: TimerRegistry::new(),
            verifier,
            config,
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = Router::new()
        .route(&config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Courier server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection from connect to teardown.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = ConnectionId::generate();
    let (mailbox, mut outbound) = mpsc::channel(state.config.limits.mailbox_capacity);
    state.registry.register(connection_id.clone(), mailbox);
    let mut session = ConnectionSession::new(connection_id.clone());

    debug!(connection = %connection_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();
    let mut close_reason: Option<String> = None;

    loop {
        tokio::select! {
            biased;

            // Drain outbound events queued by this or other connections.
            Some(event) = outbound.recv() => {
                match codec::encode_server(&event) {
                    Ok(text) => {
                        metrics::record_event(event.event_type(), "outbound");
                        if sender.send(Message::Text(text)).await.is_err() {
                            close_reason = Some("transport error".to_string());
                            break;
                        }
                    }
                    Err(e) => {
                        error!(connection = %connection_id, error = %e, "failed to encode outbound event");
                    }
                }
            }

            // Receive from the WebSocket.
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, &mut session, &text).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!(connection = %connection_id, "ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            close_reason = Some("transport error".to_string());
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(connection = %connection_id, "received close frame");
                        close_reason = frame
                            .filter(|f| !f.reason.is_empty())
                            .map(|f| f.reason.to_string())
                            .or_else(|| Some("client disconnect".to_string()));
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        close_reason = Some("transport error".to_string());
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup must run regardless of how the loop exited.
    events::teardown(&state, &mut session, close_reason);

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Decode and dispatch one inbound text frame.
async fn handle_frame(state: &Arc<AppState>, session: &mut ConnectionSession, text: &str) {
    let start = Instant::now();

    match codec::decode_client(text) {
        Ok(Inbound::Event(event)) => {
            metrics::record_event(event.event_type(), "inbound");
            events::dispatch(state, session, event).await;
        }
        Ok(Inbound::Unknown(event_type)) => {
            debug!(connection = %session.id(), event_type = %event_type, "ignoring unknown event type");
        }
        Err(ProtocolError::InvalidPayload { event_type, source }) => {
            warn!(
                connection = %session.id(),
                event_type = %event_type,
                error = %source,
                "invalid event payload"
            );
            metrics::record_error("validation");
            if let Some(error) = ServerEvent::operation_error(&event_type, source.to_string()) {
                state.registry.send_to(session.id(), error);
            }
        }
        Err(e) => {
            warn!(connection = %session.id(), error = %e, "undecodable frame");
            metrics::record_error("protocol");
        }
    }

    metrics::record_dispatch_latency(start.elapsed().as_secs_f64());
}
