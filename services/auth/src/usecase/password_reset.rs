use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::repository::{
    AccountRepository, Notifier, OneTimeCodeRepository, SessionRepository,
};
use crate::domain::types::{AccountStatus, ActionKind, ClientContext, normalize_email};
use crate::error::AuthServiceError;
use crate::usecase::credentials::CredentialVerifier;
use crate::usecase::login::deliver_code;
use crate::usecase::otp::OneTimeCodeService;
use crate::usecase::session::SessionRegistry;

pub struct RequestPasswordResetUseCase<A, C, N>
where
    A: AccountRepository,
    C: OneTimeCodeRepository,
    N: Notifier,
{
    pub accounts: A,
    pub otp: OneTimeCodeService<C>,
    pub notifier: N,
}

impl<A, C, N> RequestPasswordResetUseCase<A, C, N>
where
    A: AccountRepository,
    C: OneTimeCodeRepository,
    N: Notifier,
{
    /// Returns the account id when a code was sent. Callers must not expose
    /// the difference to the client.
    pub async fn execute(
        &self,
        email: &str,
        client: &ClientContext,
    ) -> Result<Option<Uuid>, AuthServiceError> {
        let email = normalize_email(email);
        match self.accounts.find_by_email(&email).await? {
            Some(account) if account.status == AccountStatus::Active => {
                deliver_code(&self.otp, &self.notifier, &account, ActionKind::PasswordReset, client)
                    .await?;
                info!(account_id = %account.id, "password reset code sent");
                Ok(Some(account.id))
            }
            _ => Ok(None),
        }
    }
}

pub struct CompletePasswordResetInput {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

pub struct CompletePasswordResetUseCase<A, C, S, N>
where
    A: AccountRepository,
    C: OneTimeCodeRepository,
    S: SessionRepository,
    N: Notifier,
{
    pub accounts: A,
    pub otp: OneTimeCodeService<C>,
    pub sessions: SessionRegistry<S>,
    pub notifier: N,
    pub credentials: CredentialVerifier,
}

impl<A, C, S, N> CompletePasswordResetUseCase<A, C, S, N>
where
    A: AccountRepository,
    C: OneTimeCodeRepository,
    S: SessionRepository,
    N: Notifier,
{
    /// Account a completion attempt targets, so guesses can be throttled per
    /// account instead of per client address.
    pub async fn target_account(&self, email: &str) -> Result<Option<Uuid>, AuthServiceError> {
        Ok(self
            .accounts
            .find_by_email(&normalize_email(email))
            .await?
            .map(|account| account.id))
    }

    /// Replaces the password, bumps the token generation so every issued
    /// access token stops validating, and revokes all sessions.
    pub async fn execute(&self, input: CompletePasswordResetInput) -> Result<(), AuthServiceError> {
        let account = self
            .accounts
            .find_by_email(&normalize_email(&input.email))
            .await?
            .ok_or(AuthServiceError::CodeMismatch)?;

        self.otp
            .verify_code(account.id, &input.code, ActionKind::PasswordReset)
            .await?;

        let new_password = input.new_password;
        let hash = self
            .credentials
            .run_blocking(move |c| c.hash_password(&new_password))
            .await??;
        self.accounts.update_password_hash(account.id, &hash).await?;
        let generation = self.accounts.bump_token_generation(account.id).await?;
        let revoked = self.sessions.revoke_all(account.id).await?;
        info!(account_id = %account.id, generation, revoked, "password reset completed");

        if let Err(e) = self
            .notifier
            .send(
                &account.email,
                "Your password was changed",
                "The password for your account was just reset. All sessions were signed out.",
            )
            .await
        {
            warn!(account_id = %account.id, error = %e, "password change notice not delivered");
        }
        Ok(())
    }
}
