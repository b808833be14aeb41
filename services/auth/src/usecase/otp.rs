use chrono::Duration;
use rand::RngExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::clock::SharedClock;
use crate::domain::repository::OneTimeCodeRepository;
use crate::domain::types::{ActionKind, CODE_LEN, ClientContext, OneTimeCode};
use crate::error::AuthServiceError;

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Issues and verifies single-use numeric codes scoped to account + action.
pub struct OneTimeCodeService<C: OneTimeCodeRepository> {
    pub codes: C,
    pub clock: SharedClock,
    pub ttl: Duration,
}

impl<C: OneTimeCodeRepository> OneTimeCodeService<C> {
    /// Supersedes any unconsumed code for the same account + action, then stores
    /// and returns a fresh one for out-of-band delivery.
    pub async fn create_code(
        &self,
        account_id: Uuid,
        action: ActionKind,
        client: &ClientContext,
    ) -> Result<String, AuthServiceError> {
        let superseded = self.codes.invalidate_active(account_id, action).await?;
        if superseded > 0 {
            debug!(%account_id, %action, superseded, "previous codes invalidated");
        }

        let now = self.clock.now();
        let code = OneTimeCode {
            id: Uuid::now_v7(),
            account_id,
            code: generate_code(),
            action,
            client_ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            created_at: now,
            expires_at: now + self.ttl,
            used: false,
        };
        self.codes.create(&code).await?;
        info!(%account_id, %action, "one-time code issued");
        Ok(code.code)
    }

    pub async fn verify_code(
        &self,
        account_id: Uuid,
        code: &str,
        action: ActionKind,
    ) -> Result<(), AuthServiceError> {
        let stored = self
            .codes
            .find_latest(account_id, action, code.trim())
            .await?
            .ok_or(AuthServiceError::CodeMismatch)?;

        if stored.is_expired(self.clock.now()) {
            return Err(AuthServiceError::CodeExpired);
        }
        if stored.used {
            return Err(AuthServiceError::CodeAlreadyUsed);
        }
        // Conditional flip: of two concurrent verifications only one succeeds.
        if !self.codes.mark_used(stored.id).await? {
            return Err(AuthServiceError::CodeAlreadyUsed);
        }
        info!(%account_id, %action, "one-time code verified");
        Ok(())
    }

    /// True while an issued code has been neither consumed nor superseded.
    pub async fn has_pending(
        &self,
        account_id: Uuid,
        action: ActionKind,
    ) -> Result<bool, AuthServiceError> {
        self.codes.has_unused(account_id, action).await
    }

    pub async fn invalidate(
        &self,
        account_id: Uuid,
        action: ActionKind,
    ) -> Result<(), AuthServiceError> {
        self.codes.invalidate_active(account_id, action).await?;
        Ok(())
    }
}
