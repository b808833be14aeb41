use serde::Serialize;
use uuid::Uuid;

use crate::domain::repository::{AccountRepository, SessionRepository};
use crate::domain::types::AccountStatus;
use crate::error::AuthServiceError;
use crate::usecase::session::SessionRegistry;
use crate::usecase::token::SignedCredentialIssuer;

/// Caller identity resolved from an access token plus a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub account_id: Uuid,
    pub role: String,
    pub session_id: Uuid,
}

pub struct AuthenticateUseCase<A, S>
where
    A: AccountRepository,
    S: SessionRepository,
{
    pub accounts: A,
    pub sessions: SessionRegistry<S>,
    pub issuer: SignedCredentialIssuer,
}

impl<A, S> AuthenticateUseCase<A, S>
where
    A: AccountRepository,
    S: SessionRepository,
{
    /// Both credentials must be valid and belong to the same account. The
    /// session's activity timestamp is refreshed on success.
    pub async fn execute(
        &self,
        access_token: &str,
        session_token: &str,
    ) -> Result<Principal, AuthServiceError> {
        let claims = self.issuer.verify(access_token)?;
        let account_id = claims.subject_id()?;

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthServiceError::InvalidToken)?;
        if !claims.matches_generation(account.token_generation) {
            return Err(AuthServiceError::InvalidToken);
        }
        if account.status != AccountStatus::Active {
            return Err(AuthServiceError::AccountInactive);
        }

        let session = self
            .sessions
            .resolve(session_token)
            .await?
            .filter(|s| s.account_id == account.id)
            .ok_or(AuthServiceError::InvalidSession)?;
        self.sessions.touch(session_token).await?;

        Ok(Principal {
            account_id: account.id,
            role: account.role,
            session_id: session.id,
        })
    }
}
