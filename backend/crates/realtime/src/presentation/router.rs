//! Realtime Routers

use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::{Json, Router, routing::get};
use security::SecurityAppState;
use security::middleware::require_admin;
use serde::Serialize;

use crate::application::registry::ConnectionRegistry;
use crate::presentation::gateway::{GatewayState, ws_handler};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeStatsResponse {
    pub total: usize,
    pub by_role: std::collections::BTreeMap<&'static str, usize>,
}

/// GET /api/realtime/stats
pub async fn stats(State(registry): State<Arc<ConnectionRegistry>>) -> Json<RealtimeStatsResponse> {
    Json(RealtimeStatsResponse {
        total: registry.len(),
        by_role: registry.counts_by_role(),
    })
}

/// `GET /ws`, mounted at the root
pub fn realtime_router(state: GatewayState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

/// Admin routes mounted under `/api/realtime`
pub fn realtime_api_router(registry: Arc<ConnectionRegistry>, security: SecurityAppState) -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route_layer(from_fn_with_state(security, require_admin))
        .with_state(registry)
}
