use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::error::AuthServiceError;
use crate::handlers::client::ClientInfo;
use crate::state::AppState;
use crate::usecase::password_reset::{
    CompletePasswordResetInput, CompletePasswordResetUseCase, RequestPasswordResetUseCase,
};
use crate::usecase::rate_limit::RateLimitPolicy;

// ── POST /auth/password-reset ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

/// Always 202 so the response does not reveal whether the email is registered.
pub async fn request_password_reset(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    Json(body): Json<RequestPasswordResetRequest>,
) -> Result<StatusCode, AuthServiceError> {
    state
        .limiter(RateLimitPolicy::password_reset())
        .enforce(&client, None)
        .await?;

    let usecase = RequestPasswordResetUseCase {
        accounts: state.account_repo(),
        otp: state.otp(),
        notifier: state.notifier(),
    };
    usecase.execute(&body.email, &client).await?;
    Ok(StatusCode::ACCEPTED)
}

// ── PATCH /auth/password-reset ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CompletePasswordResetRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

pub async fn complete_password_reset(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    Json(body): Json<CompletePasswordResetRequest>,
) -> Result<StatusCode, AuthServiceError> {
    let usecase = CompletePasswordResetUseCase {
        accounts: state.account_repo(),
        otp: state.otp(),
        sessions: state.sessions(),
        notifier: state.notifier(),
        credentials: state.credentials.clone(),
    };
    let account_id = usecase.target_account(&body.email).await?;
    state
        .limiter(RateLimitPolicy::mfa())
        .enforce(&client, account_id)
        .await?;
    usecase
        .execute(CompletePasswordResetInput {
            email: body.email,
            code: body.code,
            new_password: body.new_password,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
