use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::repository::{
    AccountRepository, LoginAttemptRepository, Notifier, OneTimeCodeRepository,
    SessionRepository,
};
use crate::domain::types::{
    Account, AccountStatus, ActionKind, ClientContext, FailureReason, normalize_email,
};
use crate::error::AuthServiceError;
use crate::usecase::credentials::CredentialVerifier;
use crate::usecase::lockout::LockoutEngine;
use crate::usecase::otp::OneTimeCodeService;
use crate::usecase::session::SessionRegistry;
use crate::usecase::token::SignedCredentialIssuer;

fn code_email(action: ActionKind, code: &str, ttl: Duration) -> (String, String) {
    let subject = match action {
        ActionKind::Login | ActionKind::FirstAccess => "Your sign-in code",
        ActionKind::PasswordReset => "Your password reset code",
        ActionKind::Unlock => "Your account unlock code",
    };
    let body = format!(
        "Your verification code is {code}. It expires in {} minutes.",
        ttl.num_minutes()
    );
    (subject.to_owned(), body)
}

/// Issue a code and hand it to the notifier. If delivery fails the code is
/// invalidated again and the error is returned.
pub(crate) async fn deliver_code<C, N>(
    otp: &OneTimeCodeService<C>,
    notifier: &N,
    account: &Account,
    action: ActionKind,
    client: &ClientContext,
) -> Result<(), AuthServiceError>
where
    C: OneTimeCodeRepository,
    N: Notifier,
{
    let code = otp.create_code(account.id, action, client).await?;
    let (subject, body) = code_email(action, &code, otp.ttl);
    if let Err(e) = notifier.send(&account.email, &subject, &body).await {
        warn!(account_id = %account.id, %action, error = %e, "code delivery failed, rolling back");
        otp.invalidate(account.id, action).await?;
        return Err(e);
    }
    Ok(())
}

// ── Login ─────────────────────────────────────────────────────────────────────

pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub client: ClientContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextStep {
    VerifyMfa,
}

#[derive(Debug, Serialize)]
pub struct LoginOutput {
    pub account_id: Uuid,
    pub mfa_required: bool,
    pub next_step: NextStep,
}

pub struct LoginUseCase<A, L, C, N>
where
    A: AccountRepository,
    L: LoginAttemptRepository,
    C: OneTimeCodeRepository,
    N: Notifier,
{
    pub accounts: A,
    pub lockout: LockoutEngine<A, L>,
    pub otp: OneTimeCodeService<C>,
    pub notifier: N,
    pub credentials: CredentialVerifier,
}

impl<A, L, C, N> LoginUseCase<A, L, C, N>
where
    A: AccountRepository,
    L: LoginAttemptRepository,
    C: OneTimeCodeRepository,
    N: Notifier,
{
    /// Unknown email and wrong password both surface as `InvalidCredentials`;
    /// the audit row keeps the precise reason.
    pub async fn execute(&self, input: LoginInput) -> Result<LoginOutput, AuthServiceError> {
        let email = normalize_email(&input.email);
        let client = &input.client;

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            self.lockout
                .record_failed_attempt(None, &email, client, FailureReason::UnknownEmail)
                .await?;
            return Err(AuthServiceError::InvalidCredentials);
        };

        let status = self.lockout.check_block_for(&account).await?;
        if status.blocked {
            self.lockout
                .record_failed_attempt(Some(account.id), &email, client, FailureReason::AccountBlocked)
                .await?;
            return Err(status.into_error());
        }

        if !self
            .credentials
            .verify_password(&input.password, &account.password_hash)
            .await
        {
            self.lockout
                .record_failed_attempt(Some(account.id), &email, client, FailureReason::WrongPassword)
                .await?;
            return Err(AuthServiceError::InvalidCredentials);
        }

        if account.status != AccountStatus::Active {
            self.lockout
                .record_failed_attempt(Some(account.id), &email, client, FailureReason::AccountInactive)
                .await?;
            return Err(AuthServiceError::AccountInactive);
        }

        deliver_code(&self.otp, &self.notifier, &account, ActionKind::Login, client).await?;
        self.lockout
            .record_successful_attempt(account.id, &email, client)
            .await?;
        info!(account_id = %account.id, client_ip = %client.ip, "password accepted, mfa pending");

        Ok(LoginOutput {
            account_id: account.id,
            mfa_required: true,
            next_step: NextStep::VerifyMfa,
        })
    }
}

// ── Verify MFA ────────────────────────────────────────────────────────────────

pub struct VerifyMfaInput {
    pub account_id: Uuid,
    pub code: String,
    pub action: ActionKind,
    pub client: ClientContext,
}

#[derive(Debug, Serialize)]
pub struct VerifyMfaOutput {
    pub access_token: String,
    pub access_token_exp: i64,
    pub session_token: String,
}

pub struct VerifyMfaUseCase<A, L, C, S>
where
    A: AccountRepository,
    L: LoginAttemptRepository,
    C: OneTimeCodeRepository,
    S: SessionRepository,
{
    pub accounts: A,
    pub lockout: LockoutEngine<A, L>,
    pub otp: OneTimeCodeService<C>,
    pub sessions: SessionRegistry<S>,
    pub issuer: SignedCredentialIssuer,
    pub token_ttl: Duration,
}

impl<A, L, C, S> VerifyMfaUseCase<A, L, C, S>
where
    A: AccountRepository,
    L: LoginAttemptRepository,
    C: OneTimeCodeRepository,
    S: SessionRepository,
{
    /// A blocked account is refused before its code is consumed. Only the
    /// unlock flows lift a block.
    pub async fn execute(&self, input: VerifyMfaInput) -> Result<VerifyMfaOutput, AuthServiceError> {
        // Only sign-in codes open a session; reset and unlock codes have their own flows.
        if !matches!(input.action, ActionKind::Login | ActionKind::FirstAccess) {
            return Err(AuthServiceError::CodeMismatch);
        }

        let account = self
            .accounts
            .find_by_id(input.account_id)
            .await?
            .ok_or(AuthServiceError::CodeMismatch)?;

        let status = self.lockout.check_block_for(&account).await?;
        if status.blocked {
            info!(account_id = %account.id, "mfa refused while blocked");
            return Err(status.into_error());
        }

        self.otp
            .verify_code(account.id, &input.code, input.action)
            .await?;

        if account.status != AccountStatus::Active {
            return Err(AuthServiceError::AccountInactive);
        }

        let session_token = self
            .sessions
            .create_session(account.id, &input.client)
            .await?;
        let (access_token, access_token_exp) = self.issuer.issue(
            account.id,
            &account.role,
            account.status,
            account.token_generation,
            self.token_ttl,
        )?;

        Ok(VerifyMfaOutput {
            access_token,
            access_token_exp,
            session_token,
        })
    }
}

// ── Resend code ───────────────────────────────────────────────────────────────

pub struct ResendCodeUseCase<A, C, N>
where
    A: AccountRepository,
    C: OneTimeCodeRepository,
    N: Notifier,
{
    pub accounts: A,
    pub otp: OneTimeCodeService<C>,
    pub notifier: N,
}

impl<A, C, N> ResendCodeUseCase<A, C, N>
where
    A: AccountRepository,
    C: OneTimeCodeRepository,
    N: Notifier,
{
    /// Re-issues a code only while one from `login` or a reset request is
    /// still unconsumed, so a resend can never stand in for the password.
    /// Unknown, inactive and idle accounts all answer `NoPendingCode`.
    pub async fn execute(
        &self,
        account_id: Uuid,
        action: ActionKind,
        client: &ClientContext,
    ) -> Result<(), AuthServiceError> {
        let account = match self.accounts.find_by_id(account_id).await? {
            Some(account) if account.status == AccountStatus::Active => account,
            _ => return Err(AuthServiceError::NoPendingCode),
        };
        if !self.otp.has_pending(account.id, action).await? {
            debug!(%account_id, %action, "resend without pending code");
            return Err(AuthServiceError::NoPendingCode);
        }
        deliver_code(&self.otp, &self.notifier, &account, action, client).await
    }
}

// ── Unlock ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockMethod {
    Pin,
    Security,
}

pub struct UnlockUseCase<A, L>
where
    A: AccountRepository,
    L: LoginAttemptRepository,
{
    pub lockout: LockoutEngine<A, L>,
}

impl<A, L> UnlockUseCase<A, L>
where
    A: AccountRepository,
    L: LoginAttemptRepository,
{
    // TODO: unlock attempts are neither rate limited per account nor counted
    // toward lockout; decide whether wrong secrets should escalate the block.
    pub async fn execute(
        &self,
        account_id: Uuid,
        method: UnlockMethod,
        secret: &str,
    ) -> Result<(), AuthServiceError> {
        let status = self.lockout.check_block(account_id).await?;
        if !status.blocked {
            return Err(AuthServiceError::NotBlocked);
        }
        match method {
            UnlockMethod::Pin => self.lockout.unlock_with_pin(account_id, secret).await,
            UnlockMethod::Security => {
                self.lockout
                    .unlock_with_security_question(account_id, secret)
                    .await
            }
        }
    }
}
