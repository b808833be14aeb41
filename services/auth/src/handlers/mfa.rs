use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::types::ActionKind;
use crate::error::AuthServiceError;
use crate::handlers::client::ClientInfo;
use crate::state::AppState;
use crate::usecase::login::{ResendCodeUseCase, VerifyMfaInput, VerifyMfaUseCase};
use crate::usecase::rate_limit::RateLimitPolicy;

fn default_action() -> ActionKind {
    ActionKind::Login
}

// ── POST /auth/mfa/verify ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct VerifyMfaRequest {
    pub account_id: Uuid,
    pub code: String,
    #[serde(default = "default_action")]
    pub action: ActionKind,
}

pub async fn verify_mfa(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    Json(body): Json<VerifyMfaRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    state
        .limiter(RateLimitPolicy::mfa())
        .enforce(&client, Some(body.account_id))
        .await?;

    let usecase = VerifyMfaUseCase {
        accounts: state.account_repo(),
        lockout: state.lockout(),
        otp: state.otp(),
        sessions: state.sessions(),
        issuer: state.issuer.clone(),
        token_ttl: state.access_token_ttl,
    };

    let out = usecase
        .execute(VerifyMfaInput {
            account_id: body.account_id,
            code: body.code,
            action: body.action,
            client,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(out)))
}

// ── POST /auth/mfa/resend ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ResendCodeRequest {
    pub account_id: Uuid,
    #[serde(default = "default_action")]
    pub action: ActionKind,
}

pub async fn resend_code(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    Json(body): Json<ResendCodeRequest>,
) -> Result<StatusCode, AuthServiceError> {
    state
        .limiter(RateLimitPolicy::mfa())
        .enforce(&client, Some(body.account_id))
        .await?;

    let usecase = ResendCodeUseCase {
        accounts: state.account_repo(),
        otp: state.otp(),
        notifier: state.notifier(),
    };
    usecase
        .execute(body.account_id, body.action, &client)
        .await?;
    Ok(StatusCode::ACCEPTED)
}
