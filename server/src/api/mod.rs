//! HTTP and WebSocket surface.

mod http;
mod ws;

use crate::ledger::WagerLedger;
use crate::metrics::WsMetrics;
use crate::rooms::Rooms;
use crate::session::SessionStore;
use crate::store::StateStore;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

/// Everything a handler needs, shared across the router.
pub struct AppState {
    pub markets: Vec<String>,
    pub store: Arc<dyn StateStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub ledger: Arc<WagerLedger>,
    pub rooms: Arc<Rooms>,
    pub metrics: Arc<WsMetrics>,
}

pub struct Api {
    state: Arc<AppState>,
}

impl Api {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(http::healthz))
            .route("/state/{market}", get(http::market_state))
            .route("/metrics.json", get(http::metrics))
            .route("/ws/{market}", get(ws::market_ws))
            .with_state(self.state.clone())
    }
}
