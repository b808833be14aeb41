//! Bearer access token + `x-session-token` extractor for the session API.

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};

use crate::error::AuthServiceError;
use crate::state::AppState;
use crate::usecase::authenticate::{AuthenticateUseCase, Principal};

pub const X_SESSION_TOKEN: &str = "x-session-token";

fn bearer(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Authenticated caller. Rejects with 401 when either credential is missing
/// or no longer valid.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AuthServiceError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let access_token = bearer(parts);
        let session_token = parts
            .headers
            .get(X_SESSION_TOKEN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let state = state.clone();

        async move {
            let access_token = access_token.ok_or(AuthServiceError::InvalidToken)?;
            let session_token = session_token.ok_or(AuthServiceError::InvalidSession)?;
            let usecase = AuthenticateUseCase {
                accounts: state.account_repo(),
                sessions: state.sessions(),
                issuer: state.issuer.clone(),
            };
            let principal = usecase.execute(&access_token, &session_token).await?;
            Ok(Self(principal))
        }
    }
}
