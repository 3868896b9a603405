//! WebSocket Gateway
//!
//! Handshake: blocked IP -> connection rate limit -> token. Nothing is
//! upgraded until all three pass. After the upgrade a session registers
//! the principal, sends `connected`, and runs a reader and a writer until
//! either side ends; teardown runs exactly once.
//!
//! The session works on any `Stream` of [`InboundFrame`]s and any `Sink`
//! of [`Frame`]s; the axum socket is one adapter.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use kernel::id::ConnectionId;
use kernel::principal::Principal;
use platform::client::{ClientIp, extract_bearer_token};
use platform::token::TokenVerifier;
use security::{AbuseTracker, AlertKind, NewAlert, Severity};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::application::config::RealtimeConfig;
use crate::application::registry::ConnectionRegistry;
use crate::application::router::MessageRouter;
use crate::domain::connection::{ConnectionHandle, ConnectionPhase, Frame, Lifecycle};
use crate::domain::message::{InboundMessage, OutboundMessage, kinds};
use crate::error::GatewayError;

/// Rate-limit bucket for handshakes
pub const CONNECT_ENDPOINT: &str = "ws:connect";
/// Rate-limit bucket for inbound frames
pub const MESSAGE_ENDPOINT: &str = "ws:message";

#[derive(Clone)]
pub struct GatewayState {
    pub router: Arc<MessageRouter>,
    pub tracker: Arc<AbuseTracker>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub config: Arc<RealtimeConfig>,
}

impl GatewayState {
    pub fn new(
        router: Arc<MessageRouter>,
        tracker: Arc<AbuseTracker>,
        verifier: Arc<dyn TokenVerifier>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            router,
            tracker,
            verifier,
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.router.services().registry
    }

    fn authorize(&self, ip: &str, token: Option<&str>) -> Result<Principal, GatewayError> {
        // Cheap rejection before any token work
        if self.tracker.is_blocked(ip) {
            return Err(GatewayError::Blocked);
        }

        let limit = self.tracker.check_rate_limit_detailed(
            ip,
            CONNECT_ENDPOINT,
            &self.config.connection_rate_limit,
        );
        if !limit.allowed {
            return Err(GatewayError::RateLimited {
                retry_after: limit.retry_after(self.tracker.now_ms()),
            });
        }

        let token = token.ok_or(GatewayError::MissingToken)?;
        self.verifier.verify(token).map_err(GatewayError::InvalidToken)
    }

    /// Run the handshake checks; on success the lifecycle is `Authenticating`
    pub fn handshake(
        &self,
        ip: &str,
        token: Option<&str>,
    ) -> Result<(Principal, Lifecycle), GatewayError> {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(ConnectionPhase::Connecting, ConnectionPhase::Authenticating);

        match self.authorize(ip, token) {
            Ok(principal) => Ok((principal, lifecycle)),
            Err(err) => {
                lifecycle.transition(ConnectionPhase::Authenticating, ConnectionPhase::Rejected);
                if matches!(err, GatewayError::MissingToken | GatewayError::InvalidToken(_)) {
                    self.tracker.alerts().record(
                        NewAlert::new(
                            AlertKind::ConnectionRejected,
                            Severity::Low,
                            "WebSocket handshake rejected",
                        )
                        .with_ip(ip)
                        .with_context(json!({ "reason": err.reason() })),
                    );
                }
                Err(err)
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /ws?token=...
pub async fn ws_handler(
    State(state): State<GatewayState>,
    ClientIp(ip): ClientIp,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| extract_bearer_token(&headers));

    let (principal, lifecycle) = match state.handshake(&ip, token.as_deref()) {
        Ok(accepted) => accepted,
        Err(err) => return err.into_response(),
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let max_message_bytes = state.config.max_message_bytes;
    ws.max_message_size(max_message_bytes)
        .on_upgrade(move |socket| run_socket(socket, state, principal, ip, lifecycle))
}

/// Transport-neutral inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    /// Binary frames are not part of the protocol; only the length is kept
    Binary(usize),
    Close,
}

impl InboundFrame {
    fn from_ws(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(InboundFrame::Text(text.as_str().to_owned())),
            Message::Binary(bytes) => Some(InboundFrame::Binary(bytes.len())),
            Message::Close(_) => Some(InboundFrame::Close),
            // Pings are answered by axum
            Message::Ping(_) | Message::Pong(_) => None,
        }
    }
}

async fn run_socket(
    socket: WebSocket,
    state: GatewayState,
    principal: Principal,
    ip: String,
    lifecycle: Lifecycle,
) {
    let (sink, stream) = socket.split();
    let inbound = stream.filter_map(|item| {
        future::ready(match item {
            Ok(message) => InboundFrame::from_ws(message).map(Ok),
            Err(e) => Some(Err(e)),
        })
    });
    let outbound = sink.with(|frame: Frame| {
        future::ready(Ok::<_, axum::Error>(Message::Text(frame.as_ref().into())))
    });
    run_session(state, principal, ip, lifecycle, inbound, outbound).await;
}

/// Unregisters on close, on error, and on cancellation, exactly once
struct Teardown<'a> {
    registry: &'a ConnectionRegistry,
    principal: &'a Principal,
    conn_id: ConnectionId,
    lifecycle: &'a Lifecycle,
}

impl Teardown<'_> {
    fn run(&self) {
        if !self.lifecycle.begin_close() {
            return;
        }
        let removed = self
            .registry
            .unregister_connection(&self.principal.id, self.conn_id);
        self.lifecycle.finish_close();
        info!(
            conn_id = %self.conn_id,
            principal_id = %self.principal.id,
            removed,
            "WebSocket connection closed"
        );
    }
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        self.run();
    }
}

/// Drive one authenticated connection until the transport ends
pub async fn run_session<S, E, W>(
    state: GatewayState,
    principal: Principal,
    ip: String,
    lifecycle: Lifecycle,
    mut inbound: S,
    mut outbound: W,
) where
    S: Stream<Item = Result<InboundFrame, E>> + Unpin,
    E: Display,
    W: Sink<Frame> + Unpin,
    W::Error: Display,
{
    if !lifecycle.transition(ConnectionPhase::Authenticating, ConnectionPhase::Open) {
        warn!(
            principal_id = %principal.id,
            phase = lifecycle.phase().as_str(),
            "Session started without a completed handshake"
        );
        return;
    }

    let services = state.router.services();
    let (handle, mut rx) = ConnectionHandle::channel(state.config.outbound_queue);
    let conn_id = handle.id();

    if let Some(previous) = services.registry.register(&principal, handle.clone()) {
        info!(
            principal_id = %principal.id,
            previous_conn_id = %previous.handle.id(),
            "Connection replaced by reconnect"
        );
    }
    let teardown = Teardown {
        registry: &services.registry,
        principal: &principal,
        conn_id,
        lifecycle: &lifecycle,
    };

    info!(
        conn_id = %conn_id,
        principal_id = %principal.id,
        role = %principal.role,
        ip = %ip,
        "WebSocket connection opened"
    );

    handle.send(&OutboundMessage::new(
        kinds::CONNECTED,
        json!({
            "userId": principal.id,
            "role": principal.role.code(),
        }),
        services.clock.now_ms(),
    ));

    let writer = async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = outbound.send(frame).await {
                debug!(conn_id = %conn_id, error = %e, "Outbound send failed");
                break;
            }
        }
        let _ = outbound.close().await;
    };

    let reader = async {
        while let Some(item) = inbound.next().await {
            match item {
                Ok(InboundFrame::Text(text)) => {
                    on_text(&state, &principal, &ip, &handle, &text).await;
                }
                Ok(InboundFrame::Binary(len)) => {
                    debug!(conn_id = %conn_id, len, "Binary frame ignored");
                }
                Ok(InboundFrame::Close) => {
                    debug!(conn_id = %conn_id, "Close frame received");
                    break;
                }
                Err(e) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket transport error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = reader => {}
        _ = writer => {}
    }

    teardown.run();
}

async fn on_text(
    state: &GatewayState,
    principal: &Principal,
    ip: &str,
    handle: &ConnectionHandle,
    text: &str,
) {
    if text.len() > state.config.max_message_bytes {
        warn!(principal_id = %principal.id, len = text.len(), "Oversized frame ignored");
        return;
    }

    let limit = state.tracker.check_rate_limit_detailed(
        ip,
        MESSAGE_ENDPOINT,
        &state.config.message_rate_limit,
    );
    if !limit.allowed {
        warn!(principal_id = %principal.id, ip = %ip, "Inbound message rate exceeded, frame dropped");
        return;
    }

    let message = match InboundMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(principal_id = %principal.id, error = %e, "Malformed frame ignored");
            return;
        }
    };

    state.registry().touch(&principal.id);
    state.router.dispatch(principal, handle, message).await;
}
