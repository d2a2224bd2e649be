// GET handlers: version, api/stats

use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use tracing::warn;

use super::AppState;
use crate::error::StatsError;
use crate::models::StatsResponse;

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/stats — session check, then one fresh snapshot from the configured backend.
pub(super) async fn stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, StatsError> {
    let principal = state
        .verifier
        .verify(&headers)
        .await
        .ok_or_else(|| StatsError::Unauthorized("no session".into()))?;

    let aggregator = match state.aggregator.as_ref() {
        Ok(a) => a,
        Err(message) => return Err(StatsError::Config(message.clone())),
    };
    aggregator.authorize(&principal)?;

    match aggregator.collect().await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            warn!(backend = aggregator.backend_name(), error = %e, "stats request failed");
            Err(e)
        }
    }
}
