use std::time::Duration;

use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

/// Auth service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account inactive")]
    AccountInactive,
    #[error("account blocked")]
    AccountBlocked {
        unlock_at: Option<DateTime<Utc>>,
        requires_pin_unlock: bool,
        requires_security_question: bool,
        security_question: Option<String>,
    },
    #[error("code expired")]
    CodeExpired,
    #[error("code already used")]
    CodeAlreadyUsed,
    #[error("code mismatch")]
    CodeMismatch,
    #[error("{message}")]
    RateLimited { retry_after_secs: u64, message: String },
    #[error("no pending code to resend")]
    NoPendingCode,
    #[error("invalid token")]
    InvalidToken,
    #[error("session expired")]
    InvalidSession,
    #[error("account not blocked")]
    NotBlocked,
    #[error("wrong secret")]
    WrongSecret,
    #[error("no unlock secret configured")]
    NoSecretConfigured,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountInactive => "ACCOUNT_INACTIVE",
            Self::AccountBlocked { .. } => "ACCOUNT_BLOCKED",
            Self::CodeExpired => "CODE_EXPIRED",
            Self::CodeAlreadyUsed => "CODE_ALREADY_USED",
            Self::CodeMismatch => "CODE_MISMATCH",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NoPendingCode => "NO_PENDING_CODE",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidSession => "INVALID_SESSION",
            Self::NotBlocked => "NOT_BLOCKED",
            Self::WrongSecret => "WRONG_SECRET",
            Self::NoSecretConfigured => "NO_SECRET_CONFIGURED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::CodeAlreadyUsed
            | Self::CodeMismatch
            | Self::InvalidToken
            | Self::InvalidSession
            | Self::WrongSecret => StatusCode::UNAUTHORIZED,
            Self::AccountInactive => StatusCode::FORBIDDEN,
            Self::AccountBlocked { .. } => StatusCode::LOCKED,
            Self::CodeExpired => StatusCode::GONE,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotBlocked | Self::NoPendingCode => StatusCode::CONFLICT,
            Self::NoSecretConfigured => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Only 500s are logged here; TraceLayer already records every status.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        let mut body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        let mut retry_after = None;
        match &self {
            Self::AccountBlocked {
                unlock_at,
                requires_pin_unlock,
                requires_security_question,
                security_question,
            } => {
                body["unlock_at"] = serde_json::json!(unlock_at);
                body["requires_pin_unlock"] = serde_json::json!(requires_pin_unlock);
                body["requires_security_question"] =
                    serde_json::json!(requires_security_question);
                if let Some(question) = security_question {
                    body["security_question"] = serde_json::json!(question);
                }
            }
            Self::RateLimited {
                retry_after_secs, ..
            } => {
                body["retry_after"] = serde_json::json!(retry_after_secs);
                retry_after = Some(*retry_after_secs);
            }
            _ => {}
        }
        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Failure talking to the shared counter store. Internal only: callers degrade
/// to the in-process store or fail open, never surface it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected counter store reply: {0}")]
    Protocol(String),
}
