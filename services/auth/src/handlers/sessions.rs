use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::repository::AccountRepository;
use crate::error::AuthServiceError;
use crate::handlers::principal::{Authenticated, X_SESSION_TOKEN};
use crate::state::AppState;

// ── GET /auth/sessions ────────────────────────────────────────────────────────

pub async fn list_sessions(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<impl IntoResponse, AuthServiceError> {
    let sessions = state.sessions().list_sessions(principal.account_id).await?;
    Ok(Json(sessions))
}

// ── DELETE /auth/sessions ─────────────────────────────────────────────────────

/// Log out everywhere: every session goes and every issued access token stops
/// validating.
pub async fn revoke_all_sessions(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<StatusCode, AuthServiceError> {
    state.sessions().revoke_all(principal.account_id).await?;
    let generation = state
        .account_repo()
        .bump_token_generation(principal.account_id)
        .await?;
    info!(account_id = %principal.account_id, generation, "signed out everywhere");
    Ok(StatusCode::NO_CONTENT)
}

// ── DELETE /auth/sessions/{session_id} ────────────────────────────────────────

pub async fn revoke_session(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AuthServiceError> {
    let registry = state.sessions();
    let owned = registry
        .list_sessions(principal.account_id)
        .await?
        .iter()
        .any(|s| s.id == session_id);
    if owned {
        registry.revoke(session_id).await?;
    } else {
        debug!(%session_id, "revoke of unknown or foreign session ignored");
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── DELETE /auth/session ──────────────────────────────────────────────────────

/// Sign out the calling session.
pub async fn logout(
    State(state): State<AppState>,
    Authenticated(_principal): Authenticated,
    headers: HeaderMap,
) -> Result<StatusCode, AuthServiceError> {
    if let Some(token) = headers.get(X_SESSION_TOKEN).and_then(|v| v.to_str().ok()) {
        state.sessions().revoke_by_token(token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}
