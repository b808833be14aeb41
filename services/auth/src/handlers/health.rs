use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

/// Handler for `GET /healthz`: liveness check.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub database: bool,
    pub counter_store: &'static str,
}

/// Handler for `GET /readyz`. Only the database gates readiness; a degraded
/// counter store is reported but still ready.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "database ping failed");
            false
        }
    };
    let body = ReadyResponse {
        database,
        counter_store: state.counter_store.mode().await.as_str(),
    };
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
