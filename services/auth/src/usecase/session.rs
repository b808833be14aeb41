use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::clock::SharedClock;
use crate::domain::repository::SessionRepository;
use crate::domain::types::{ActiveSession, ClientContext, SESSION_TOKEN_BYTES};
use crate::error::AuthServiceError;

fn generate_token() -> String {
    let bytes: [u8; SESSION_TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Single-active-session registry. Every operation except `create_session`
/// is idempotent: a missing session is not an error.
pub struct SessionRegistry<S: SessionRepository> {
    pub sessions: S,
    pub clock: SharedClock,
    pub idle_timeout: Duration,
}

impl<S: SessionRepository> SessionRegistry<S> {
    /// Revokes every existing session of the account and creates a new one.
    /// Concurrent calls are serialized by the repository; the last one wins.
    pub async fn create_session(
        &self,
        account_id: Uuid,
        client: &ClientContext,
    ) -> Result<String, AuthServiceError> {
        if let Err(e) = self.sweep_expired().await {
            warn!(error = %e, "idle session sweep failed");
        }

        let now = self.clock.now();
        let session = ActiveSession {
            id: Uuid::now_v7(),
            account_id,
            token: generate_token(),
            client_ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            created_at: now,
            last_activity_at: now,
        };
        let revoked = self.sessions.replace_for_account(&session).await?;
        info!(%account_id, session_id = %session.id, revoked, "session created");
        Ok(session.token)
    }

    pub async fn touch(&self, token: &str) -> Result<(), AuthServiceError> {
        if !self.sessions.touch(token, self.clock.now()).await? {
            debug!("touch on missing session ignored");
        }
        Ok(())
    }

    /// Live session for this token, or `None` if revoked or idle too long.
    pub async fn resolve(&self, token: &str) -> Result<Option<ActiveSession>, AuthServiceError> {
        let Some(session) = self.sessions.find_by_token(token).await? else {
            return Ok(None);
        };
        if session.last_activity_at < self.clock.now() - self.idle_timeout {
            self.sessions.delete(session.id).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub async fn list_sessions(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ActiveSession>, AuthServiceError> {
        self.sessions.list_by_account(account_id).await
    }

    pub async fn revoke(&self, session_id: Uuid) -> Result<(), AuthServiceError> {
        if self.sessions.delete(session_id).await? {
            info!(%session_id, "session revoked");
        }
        Ok(())
    }

    pub async fn revoke_by_token(&self, token: &str) -> Result<(), AuthServiceError> {
        if self.sessions.delete_by_token(token).await? {
            info!("session revoked by token");
        }
        Ok(())
    }

    pub async fn revoke_all(&self, account_id: Uuid) -> Result<u64, AuthServiceError> {
        let revoked = self.sessions.delete_by_account(account_id).await?;
        info!(%account_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    pub async fn sweep_expired(&self) -> Result<u64, AuthServiceError> {
        let swept = self
            .sessions
            .delete_idle(self.clock.now() - self.idle_timeout)
            .await?;
        if swept > 0 {
            info!(swept, "idle sessions swept");
        }
        Ok(swept)
    }
}
