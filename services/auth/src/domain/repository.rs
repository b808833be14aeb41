#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{
    Account, ActionKind, ActiveSession, LoginAttempt, OneTimeCode, WindowHit,
};
use crate::error::{AuthServiceError, StoreError};

/// Port for the account table. Accounts are owned by the business layer;
/// the core only reads them and mutates authentication state.
pub trait AccountRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthServiceError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AuthServiceError>;

    /// Set the block flag and start timestamp unless a block is already running.
    /// Returns `true` when this call started the block.
    async fn set_block_if_clear(
        &self,
        id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<bool, AuthServiceError>;

    /// Clear the block flag and start timestamp.
    async fn clear_block(&self, id: Uuid) -> Result<(), AuthServiceError>;

    /// Atomically increment the token generation. Returns the new value.
    async fn bump_token_generation(&self, id: Uuid) -> Result<u64, AuthServiceError>;

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<(), AuthServiceError>;
}

/// Append-only audit log of login attempts.
pub trait LoginAttemptRepository: Send + Sync {
    async fn append(&self, attempt: &LoginAttempt) -> Result<(), AuthServiceError>;

    /// Timestamp of the latest successful attempt after `since`, if any.
    async fn last_success_since(
        &self,
        account_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, AuthServiceError>;

    /// Count failed attempts strictly after `since`.
    async fn count_failures_since(
        &self,
        account_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64, AuthServiceError>;
}

/// Repository for one-time codes.
pub trait OneTimeCodeRepository: Send + Sync {
    /// Mark every unused code for this account + action as used.
    async fn invalidate_active(
        &self,
        account_id: Uuid,
        action: ActionKind,
    ) -> Result<u64, AuthServiceError>;

    async fn create(&self, code: &OneTimeCode) -> Result<(), AuthServiceError>;

    /// Most recently issued code for account + action with this value, used or not.
    async fn find_latest(
        &self,
        account_id: Uuid,
        action: ActionKind,
        code: &str,
    ) -> Result<Option<OneTimeCode>, AuthServiceError>;

    /// Whether a code for this account + action is still unconsumed, expired or not.
    async fn has_unused(&self, account_id: Uuid, action: ActionKind) -> Result<bool, AuthServiceError>;

    /// Flip `used` from false to true. Returns `false` if another caller got there first.
    async fn mark_used(&self, id: Uuid) -> Result<bool, AuthServiceError>;
}

/// Repository for server-side sessions.
pub trait SessionRepository: Send + Sync {
    /// Delete every session of `session.account_id` and insert `session`, as one
    /// unit serialized per account. Returns the number of sessions revoked.
    async fn replace_for_account(&self, session: &ActiveSession) -> Result<u64, AuthServiceError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<ActiveSession>, AuthServiceError>;

    async fn list_by_account(&self, account_id: Uuid)
    -> Result<Vec<ActiveSession>, AuthServiceError>;

    /// Returns `false` if no session has this token.
    async fn touch(&self, token: &str, at: DateTime<Utc>) -> Result<bool, AuthServiceError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AuthServiceError>;
    async fn delete_by_token(&self, token: &str) -> Result<bool, AuthServiceError>;
    async fn delete_by_account(&self, account_id: Uuid) -> Result<u64, AuthServiceError>;

    /// Delete sessions whose last activity is strictly before `before`.
    async fn delete_idle(&self, before: DateTime<Utc>) -> Result<u64, AuthServiceError>;
}

/// Outbound notification channel (email).
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AuthServiceError>;
}

/// Shared key/value store with sliding-window counters.
pub trait CounterStore: Send + Sync {
    /// Atomically evict markers older than `now_ms - window_ms` under `key`, then
    /// record a marker at `now_ms` iff fewer than `max` remain.
    async fn record_hit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        max: u64,
    ) -> Result<WindowHit, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
