//! Per-account lockout driven by the login-attempt audit log.
//!
//! The failure count is the number of failed attempts after the later of the
//! last successful attempt and `now - 24h`. Success therefore resets the count
//! without deleting audit rows. The count is mapped through an ordered
//! escalation table to a block duration.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::clock::SharedClock;
use crate::domain::repository::{AccountRepository, LoginAttemptRepository};
use crate::domain::types::{AUDIT_HORIZON_HOURS, Account, ClientContext, FailureReason, LoginAttempt};
use crate::error::AuthServiceError;
use crate::usecase::credentials::CredentialVerifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDuration {
    Minutes(i64),
    Permanent,
}

impl BlockDuration {
    /// `None` for permanent blocks.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Minutes(m) => Some(Duration::minutes(*m)),
            Self::Permanent => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationStep {
    pub attempts: u64,
    pub block: BlockDuration,
}

const fn step(attempts: u64, block: BlockDuration) -> EscalationStep {
    EscalationStep { attempts, block }
}

/// Ordered by ascending `attempts`.
pub const DEFAULT_ESCALATION: &[EscalationStep] = &[
    step(5, BlockDuration::Minutes(1)),
    step(8, BlockDuration::Minutes(5)),
    step(12, BlockDuration::Minutes(30)),
    step(15, BlockDuration::Minutes(120)),
    step(20, BlockDuration::Permanent),
];

#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    pub steps: Vec<EscalationStep>,
    pub horizon: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            steps: DEFAULT_ESCALATION.to_vec(),
            horizon: Duration::hours(AUDIT_HORIZON_HOURS),
        }
    }
}

impl LockoutPolicy {
    /// Count at which the first block is applied.
    pub fn first_threshold(&self) -> u64 {
        self.steps.first().map_or(u64::MAX, |s| s.attempts)
    }

    /// First step whose `attempts` is at least `count`; the last step once the
    /// count exceeds every entry. `None` below the first threshold.
    pub fn step_for(&self, count: u64) -> Option<&EscalationStep> {
        if count < self.first_threshold() {
            return None;
        }
        self.steps
            .iter()
            .find(|s| s.attempts >= count)
            .or_else(|| self.steps.last())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStatus {
    pub blocked: bool,
    /// `None` while blocked means the block is permanent.
    pub unlock_at: Option<DateTime<Utc>>,
    pub requires_pin_unlock: bool,
    pub requires_security_question: bool,
    /// Question to show when the security-answer unlock is offered.
    pub security_question: Option<String>,
    pub attempt_count: u64,
}

impl BlockStatus {
    fn open(attempt_count: u64) -> Self {
        Self {
            blocked: false,
            unlock_at: None,
            requires_pin_unlock: false,
            requires_security_question: false,
            security_question: None,
            attempt_count,
        }
    }

    pub fn into_error(self) -> AuthServiceError {
        AuthServiceError::AccountBlocked {
            unlock_at: self.unlock_at,
            requires_pin_unlock: self.requires_pin_unlock,
            requires_security_question: self.requires_security_question,
            security_question: self.security_question,
        }
    }
}

pub struct LockoutEngine<A, L>
where
    A: AccountRepository,
    L: LoginAttemptRepository,
{
    pub accounts: A,
    pub attempts: L,
    pub credentials: CredentialVerifier,
    pub policy: LockoutPolicy,
    pub clock: SharedClock,
}

impl<A, L> LockoutEngine<A, L>
where
    A: AccountRepository,
    L: LoginAttemptRepository,
{
    /// Append a failed attempt and, for known accounts, start a block once the
    /// first threshold is reached. An already running block keeps its start time.
    pub async fn record_failed_attempt(
        &self,
        account_id: Option<Uuid>,
        identifier: &str,
        client: &ClientContext,
        reason: FailureReason,
    ) -> Result<(), AuthServiceError> {
        let now = self.clock.now();
        self.attempts
            .append(&LoginAttempt {
                id: Uuid::now_v7(),
                account_id,
                email: identifier.to_owned(),
                succeeded: false,
                client_ip: client.ip.clone(),
                user_agent: client.user_agent.clone(),
                failure_reason: Some(reason.as_str().to_owned()),
                created_at: now,
            })
            .await?;

        let Some(account_id) = account_id else {
            debug!(client_ip = %client.ip, reason = reason.as_str(), "failed login for unknown identifier");
            return Ok(());
        };

        let count = self.failure_count(account_id).await?;
        info!(%account_id, count, reason = reason.as_str(), "failed login recorded");
        if count >= self.policy.first_threshold()
            && self.accounts.set_block_if_clear(account_id, now).await?
        {
            info!(%account_id, count, "account blocked");
        }
        Ok(())
    }

    pub async fn record_successful_attempt(
        &self,
        account_id: Uuid,
        identifier: &str,
        client: &ClientContext,
    ) -> Result<(), AuthServiceError> {
        self.attempts
            .append(&LoginAttempt {
                id: Uuid::now_v7(),
                account_id: Some(account_id),
                email: identifier.to_owned(),
                succeeded: true,
                client_ip: client.ip.clone(),
                user_agent: client.user_agent.clone(),
                failure_reason: None,
                created_at: self.clock.now(),
            })
            .await
    }

    pub async fn failure_count(&self, account_id: Uuid) -> Result<u64, AuthServiceError> {
        let horizon = self.clock.now() - self.policy.horizon;
        let since = self
            .attempts
            .last_success_since(account_id, horizon)
            .await?
            .map_or(horizon, |last| last.max(horizon));
        self.attempts.count_failures_since(account_id, since).await
    }

    pub async fn check_block(&self, account_id: Uuid) -> Result<BlockStatus, AuthServiceError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthServiceError::InvalidCredentials)?;
        self.check_block_for(&account).await
    }

    /// Expired temporary blocks are cleared as a side effect.
    pub async fn check_block_for(&self, account: &Account) -> Result<BlockStatus, AuthServiceError> {
        let count = self.failure_count(account.id).await?;
        if !account.blocked {
            return Ok(BlockStatus::open(count));
        }

        let Some(step) = self.policy.step_for(count) else {
            // History aged out of the audit horizon.
            self.clear_failed_attempts(account.id).await?;
            return Ok(BlockStatus::open(count));
        };

        let Some(duration) = step.block.as_duration() else {
            let requires_security_question = account.security_answer_hash.is_some();
            return Ok(BlockStatus {
                blocked: true,
                unlock_at: None,
                requires_pin_unlock: account.pin_hash.is_some(),
                requires_security_question,
                security_question: account
                    .security_question
                    .clone()
                    .filter(|_| requires_security_question),
                attempt_count: count,
            });
        };

        let now = self.clock.now();
        let unlock_at = account.block_started_at.map(|started| started + duration);
        match unlock_at {
            Some(unlock_at) if now < unlock_at => Ok(BlockStatus {
                blocked: true,
                unlock_at: Some(unlock_at),
                requires_pin_unlock: false,
                requires_security_question: false,
                security_question: None,
                attempt_count: count,
            }),
            _ => {
                self.clear_failed_attempts(account.id).await?;
                info!(account_id = %account.id, "temporary block expired");
                Ok(BlockStatus::open(count))
            }
        }
    }

    /// Clear the block flag. The audit trail is kept.
    pub async fn clear_failed_attempts(&self, account_id: Uuid) -> Result<(), AuthServiceError> {
        self.accounts.clear_block(account_id).await
    }

    /// A wrong PIN is not a login attempt and leaves the failure count untouched.
    pub async fn unlock_with_pin(&self, account_id: Uuid, pin: &str) -> Result<(), AuthServiceError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthServiceError::InvalidCredentials)?;
        let stored = account
            .pin_hash
            .as_deref()
            .ok_or(AuthServiceError::NoSecretConfigured)?;
        if !self.credentials.verify_pin(pin, stored).await {
            info!(%account_id, "pin unlock rejected");
            return Err(AuthServiceError::WrongSecret);
        }
        self.clear_failed_attempts(account_id).await?;
        info!(%account_id, "account unlocked with pin");
        Ok(())
    }

    pub async fn unlock_with_security_question(
        &self,
        account_id: Uuid,
        answer: &str,
    ) -> Result<(), AuthServiceError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthServiceError::InvalidCredentials)?;
        let stored = account
            .security_answer_hash
            .as_deref()
            .ok_or(AuthServiceError::NoSecretConfigured)?;
        if !self.credentials.verify_security_answer(answer, stored).await {
            info!(%account_id, "security question unlock rejected");
            return Err(AuthServiceError::WrongSecret);
        }
        self.clear_failed_attempts(account_id).await?;
        info!(%account_id, "account unlocked with security question");
        Ok(())
    }
}
