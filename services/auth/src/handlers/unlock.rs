use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AuthServiceError;
use crate::handlers::client::ClientInfo;
use crate::state::AppState;
use crate::usecase::login::{UnlockMethod, UnlockUseCase};
use crate::usecase::rate_limit::RateLimitPolicy;

// ── POST /auth/unlock ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UnlockRequest {
    pub account_id: Uuid,
    pub method: UnlockMethod,
    pub secret: String,
}

pub async fn unlock(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    Json(body): Json<UnlockRequest>,
) -> Result<StatusCode, AuthServiceError> {
    state
        .limiter(RateLimitPolicy::mfa())
        .enforce(&client, Some(body.account_id))
        .await?;

    let usecase = UnlockUseCase {
        lockout: state.lockout(),
    };
    usecase
        .execute(body.account_id, body.method, &body.secret)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
