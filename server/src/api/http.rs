//! HTTP sidecar: liveness, state queries, connection metrics.

use super::AppState;
use crate::store::read_json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use plinko_types::{keys, RoundState};
use serde_json::json;
use std::sync::Arc;

pub(super) async fn healthz(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    match app.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ok"}))),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "degraded", "error": err.to_string()})),
        ),
    }
}

pub(super) async fn market_state(
    State(app): State<Arc<AppState>>,
    Path(market): Path<String>,
) -> impl IntoResponse {
    if !app.markets.contains(&market) {
        return (StatusCode::NOT_FOUND, "unknown market").into_response();
    }
    match read_json::<RoundState>(&*app.store, &keys::state(&market)).await {
        Ok(Some(state)) => Json(state).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "no round yet").into_response(),
        Err(err) => {
            tracing::warn!(market = %market, error = %err, "state query failed");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable").into_response()
        }
    }
}

pub(super) async fn metrics(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app.metrics.snapshot())
}
