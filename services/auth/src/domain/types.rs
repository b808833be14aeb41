use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

/// What a one-time code authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Login,
    FirstAccess,
    PasswordReset,
    Unlock,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::FirstAccess => "FIRST_ACCESS",
            Self::PasswordReset => "PASSWORD_RESET",
            Self::Unlock => "UNLOCK",
        }
    }
}

impl FromStr for ActionKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOGIN" => Ok(Self::Login),
            "FIRST_ACCESS" => Ok(Self::FirstAccess),
            "PASSWORD_RESET" => Ok(Self::PasswordReset),
            "UNLOCK" => Ok(Self::Unlock),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(pub String);

/// Authentication-relevant view of an account. Owned by the business layer.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub status: AccountStatus,
    pub password_hash: String,
    pub pin_hash: Option<String>,
    pub security_question: Option<String>,
    pub security_answer_hash: Option<String>,
    pub blocked: bool,
    pub block_started_at: Option<DateTime<Utc>>,
    pub token_generation: u64,
}

/// Why a login attempt failed. Kept precise in the audit log only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    UnknownEmail,
    WrongPassword,
    AccountInactive,
    AccountBlocked,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownEmail => "unknown_email",
            Self::WrongPassword => "wrong_password",
            Self::AccountInactive => "account_inactive",
            Self::AccountBlocked => "account_blocked",
        }
    }
}

/// Audit record of a single login attempt. Append-only.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub id: Uuid,
    pub account_id: Option<Uuid>,
    pub email: String,
    pub succeeded: bool,
    pub client_ip: String,
    pub user_agent: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OneTimeCode {
    pub id: Uuid,
    pub account_id: Uuid,
    pub code: String,
    pub action: ActionKind,
    pub client_ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl OneTimeCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveSession {
    pub id: Uuid,
    pub account_id: Uuid,
    #[serde(skip_serializing)]
    pub token: String,
    pub client_ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Emails are matched trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Network identity of the caller, attached to audit rows, codes and sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub ip: String,
    pub user_agent: String,
}

impl ClientContext {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// Result of one atomic sliding-window hit in the counter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub allowed: bool,
    /// Markers inside the window after this hit.
    pub count: u64,
    /// Timestamp (ms) of the oldest marker still inside the window.
    pub oldest_ms: i64,
}

/// One-time code length in digits.
pub const CODE_LEN: usize = 6;

/// Default one-time code time-to-live in seconds.
pub const DEFAULT_CODE_TTL_SECS: i64 = 300;

/// Failed attempts older than this are never counted for lockout.
pub const AUDIT_HORIZON_HOURS: i64 = 24;

/// Sessions idle for longer than this are swept.
pub const DEFAULT_SESSION_IDLE_SECS: i64 = 86_400;

/// Default lifetime of a signed credential in seconds (4 hours).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 14_400;

/// Random bytes behind an opaque session token.
pub const SESSION_TOKEN_BYTES: usize = 32;
