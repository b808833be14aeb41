use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use crate::error::AuthServiceError;
use crate::handlers::client::ClientInfo;
use crate::state::AppState;
use crate::usecase::login::{LoginInput, LoginUseCase};
use crate::usecase::rate_limit::RateLimitPolicy;

// ── POST /auth/login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    state
        .limiter(RateLimitPolicy::login())
        .enforce(&client, None)
        .await?;

    let usecase = LoginUseCase {
        accounts: state.account_repo(),
        lockout: state.lockout(),
        otp: state.otp(),
        notifier: state.notifier(),
        credentials: state.credentials.clone(),
    };

    let out = usecase
        .execute(LoginInput {
            email: body.email,
            password: body.password,
            client,
        })
        .await?;

    Ok((StatusCode::OK, Json(out)))
}
