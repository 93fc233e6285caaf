use axum::{
    extract::{Path, State},
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use vela_shared::Network;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/providers/{provider}/enabled", put(set_provider_enabled))
        .route("/v1/admin/orders/{id}/redispatch", post(redispatch_order))
        .route("/v1/admin/reconcile/run", post(run_reconciliation))
        .route("/v1/admin/fallback/run", post(run_fallback))
}

/// PUT /v1/admin/providers/{provider}/enabled
///
/// Accepts a provider name ("codecraft") or a network name ("telecel",
/// resolved to whichever provider serves it). The flag is read fresh on
/// every dispatch and poll, so the toggle applies from the next cycle.
async fn set_provider_enabled(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<Value>, AppError> {
    let key = provider.to_lowercase();
    let updated = state.registry.set_enabled(&key, req.enabled)
        || Network::parse(&key)
            .map(|network| state.registry.set_enabled_for_network(network, req.enabled))
            .unwrap_or(false);

    if !updated {
        return Err(AppError::NotFoundError(format!(
            "unknown provider or network: {}",
            provider
        )));
    }
    Ok(Json(json!({ "provider": key, "enabled": req.enabled })))
}

/// POST /v1/admin/orders/{id}/redispatch, the manual retry for parked orders
async fn redispatch_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let disposition = state.coordinator.redispatch(id).await?;
    Ok(Json(json!({
        "order_id": id,
        "disposition": format!("{:?}", disposition),
    })))
}

/// POST /v1/admin/reconcile/run, triggers a sweep outside the schedule
async fn run_reconciliation(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    match state.reconciler.run_once().await? {
        Some(report) => Ok(Json(json!({ "ran": true, "report": report }))),
        None => Ok(Json(json!({ "ran": false, "reason": "already running" }))),
    }
}

/// POST /v1/admin/fallback/run, triggers a sweep outside the schedule
async fn run_fallback(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    match state.fallback.run_once().await? {
        Some(report) => Ok(Json(json!({ "ran": true, "report": report }))),
        None => Ok(Json(json!({ "ran": false, "reason": "already running" }))),
    }
}
