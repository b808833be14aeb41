use chrono::Duration;
use uuid::Uuid;

use gatekeep_auth::domain::types::{AccountStatus, ActionKind, ClientContext, FailureReason};
use gatekeep_auth::error::AuthServiceError;
use gatekeep_auth::infra::cache::MemoryCounterStore;
use gatekeep_auth::usecase::login::{LoginInput, NextStep, VerifyMfaInput};
use gatekeep_auth::usecase::password_reset::CompletePasswordResetInput;
use gatekeep_auth::usecase::rate_limit::{RateLimitPolicy, RateLimiter};

use crate::helpers::{Harness, RecordingNotifier, TEST_PASSWORD, client};

fn login_input(h: &Harness, password: &str) -> LoginInput {
    LoginInput {
        email: h.account.email.clone(),
        password: password.to_owned(),
        client: client(),
    }
}

fn mfa_input(h: &Harness, code: String) -> VerifyMfaInput {
    VerifyMfaInput {
        account_id: h.account.id,
        code,
        action: ActionKind::Login,
        client: client(),
    }
}

// ── Login ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_complete_login_and_mfa() {
    let h = Harness::new();
    let out = h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap();
    assert_eq!(out.account_id, h.account.id);
    assert!(out.mfa_required);
    assert_eq!(out.next_step, NextStep::VerifyMfa);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, h.account.email);

    h.advance(Duration::seconds(30));
    let tokens = h
        .verify_mfa()
        .execute(mfa_input(&h, h.notifier.last_code()))
        .await
        .unwrap();
    assert_eq!(tokens.access_token_exp, (h.now() + Duration::hours(4)).timestamp());

    let principal = h
        .authenticate()
        .execute(&tokens.access_token, &tokens.session_token)
        .await
        .unwrap();
    assert_eq!(principal.account_id, h.account.id);
    assert_eq!(principal.role, "member");
}

#[tokio::test]
async fn should_normalize_email_before_lookup() {
    let h = Harness::new();
    let mut input = login_input(&h, TEST_PASSWORD);
    input.email = "  User@Example.COM ".to_owned();
    h.login().execute(input).await.unwrap();
}

#[tokio::test]
async fn should_not_reveal_whether_email_exists() {
    let h = Harness::new();
    let unknown = h
        .login()
        .execute(LoginInput {
            email: "nobody@example.com".to_owned(),
            password: TEST_PASSWORD.to_owned(),
            client: client(),
        })
        .await
        .unwrap_err();
    let wrong = h.login().execute(login_input(&h, "hunter2")).await.unwrap_err();

    assert_eq!(unknown.kind(), wrong.kind());
    assert_eq!(unknown.status(), wrong.status());
    assert_eq!(unknown.to_string(), wrong.to_string());

    let reasons: Vec<_> = h
        .attempts
        .all()
        .into_iter()
        .map(|a| a.failure_reason.unwrap())
        .collect();
    assert_eq!(
        reasons,
        [
            FailureReason::UnknownEmail.as_str(),
            FailureReason::WrongPassword.as_str()
        ]
    );
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn should_reject_inactive_account_after_password_check() {
    let h = Harness::new();
    h.accounts.accounts.lock().unwrap()[0].status = AccountStatus::Inactive;

    let err = h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap_err();
    assert!(matches!(err, AuthServiceError::AccountInactive));

    let err = h.login().execute(login_input(&h, "hunter2")).await.unwrap_err();
    assert!(matches!(err, AuthServiceError::InvalidCredentials));
}

#[tokio::test]
async fn should_block_after_repeated_wrong_passwords() {
    let h = Harness::new();
    for _ in 0..5 {
        let err = h.login().execute(login_input(&h, "hunter2")).await.unwrap_err();
        assert!(matches!(err, AuthServiceError::InvalidCredentials));
    }

    let err = h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap_err();
    match err {
        AuthServiceError::AccountBlocked { unlock_at, .. } => assert!(unlock_at.is_some()),
        other => panic!("expected AccountBlocked, got {other:?}"),
    }
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn should_roll_back_code_when_delivery_fails() {
    let h = Harness::with_notifier(RecordingNotifier::failing());
    let err = h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap_err();
    assert!(matches!(err, AuthServiceError::Internal(_)));

    let codes = h.codes.all();
    assert_eq!(codes.len(), 1);
    assert!(codes[0].used);
    // No success is recorded for a login that never reached the user.
    assert!(h.attempts.all().iter().all(|a| !a.succeeded));
}

// ── MFA verification ─────────────────────────────────────────────────────────

#[tokio::test]
async fn should_reject_replayed_code() {
    let h = Harness::new();
    h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap();
    let code = h.notifier.last_code();

    h.verify_mfa().execute(mfa_input(&h, code.clone())).await.unwrap();
    let err = h.verify_mfa().execute(mfa_input(&h, code)).await.unwrap_err();
    assert!(matches!(err, AuthServiceError::CodeAlreadyUsed));
}

#[tokio::test]
async fn should_reject_expired_mfa_code() {
    let h = Harness::new();
    h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap();

    h.advance(Duration::seconds(301));
    let err = h
        .verify_mfa()
        .execute(mfa_input(&h, h.notifier.last_code()))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::CodeExpired));
    assert!(h.sessions.all().is_empty());
}

#[tokio::test]
async fn should_refuse_reset_code_as_login_code() {
    let h = Harness::new();
    h.request_reset()
        .execute(&h.account.email, &client())
        .await
        .unwrap();

    let mut input = mfa_input(&h, h.notifier.last_code());
    input.action = ActionKind::PasswordReset;
    let err = h.verify_mfa().execute(input).await.unwrap_err();
    assert!(matches!(err, AuthServiceError::CodeMismatch));
}

#[tokio::test]
async fn should_accept_only_resent_code() {
    let h = Harness::new();
    h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap();
    let first = h.notifier.last_code();

    h.advance(Duration::seconds(20));
    h.resend()
        .execute(h.account.id, ActionKind::Login, &client())
        .await
        .unwrap();
    let second = h.notifier.last_code();
    assert_eq!(h.notifier.sent().len(), 2);

    if first != second {
        let err = h.verify_mfa().execute(mfa_input(&h, first)).await.unwrap_err();
        assert!(matches!(err, AuthServiceError::CodeAlreadyUsed));
    }
    h.verify_mfa().execute(mfa_input(&h, second)).await.unwrap();
}

#[tokio::test]
async fn should_refuse_resend_for_unknown_account() {
    let h = Harness::new();
    let err = h
        .resend()
        .execute(Uuid::now_v7(), ActionKind::Login, &client())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::NoPendingCode));
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn should_refuse_resend_without_password_step() {
    let h = Harness::new();
    for action in [ActionKind::Login, ActionKind::FirstAccess] {
        let err = h
            .resend()
            .execute(h.account.id, action, &client())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::NoPendingCode));
    }
    assert!(h.notifier.sent().is_empty());
    assert!(h.codes.all().is_empty());
}

#[tokio::test]
async fn should_refuse_resend_after_code_consumed() {
    let h = Harness::new();
    h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap();
    h.verify_mfa()
        .execute(mfa_input(&h, h.notifier.last_code()))
        .await
        .unwrap();

    let err = h
        .resend()
        .execute(h.account.id, ActionKind::Login, &client())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::NoPendingCode));
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn should_keep_permanent_block_through_resend_and_verify() {
    let h = Harness::new();
    h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap();
    let pending = h.notifier.last_code();

    h.advance(Duration::seconds(1));
    for _ in 0..20 {
        h.login().execute(login_input(&h, "hunter2")).await.unwrap_err();
    }
    let before = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(before.blocked);
    assert!(before.unlock_at.is_none());

    // The code issued before the block still exists, so resend goes through,
    // but neither code may open a session while the block stands.
    h.resend()
        .execute(h.account.id, ActionKind::Login, &client())
        .await
        .unwrap();
    for code in [pending, h.notifier.last_code()] {
        let err = h.verify_mfa().execute(mfa_input(&h, code)).await.unwrap_err();
        match err {
            AuthServiceError::AccountBlocked { unlock_at, .. } => assert!(unlock_at.is_none()),
            other => panic!("expected AccountBlocked, got {other:?}"),
        }
    }

    assert!(h.sessions.all().is_empty());
    assert!(h.accounts.get(h.account.id).blocked);
    let after = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(after.blocked);
    assert!(after.unlock_at.is_none());
}

#[tokio::test]
async fn should_not_consume_code_while_temporarily_blocked() {
    let h = Harness::new();
    h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap();
    let code = h.notifier.last_code();

    h.advance(Duration::seconds(1));
    for _ in 0..5 {
        h.login().execute(login_input(&h, "hunter2")).await.unwrap_err();
    }
    let err = h
        .verify_mfa()
        .execute(mfa_input(&h, code.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::AccountBlocked { .. }));

    // One-minute block over, code still inside its five-minute lifetime.
    h.advance(Duration::seconds(61));
    h.verify_mfa().execute(mfa_input(&h, code)).await.unwrap();
}

#[tokio::test]
async fn should_replace_session_on_second_login() {
    let h = Harness::new();
    h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap();
    let first = h
        .verify_mfa()
        .execute(mfa_input(&h, h.notifier.last_code()))
        .await
        .unwrap();

    h.advance(Duration::minutes(1));
    h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap();
    let second = h
        .verify_mfa()
        .execute(mfa_input(&h, h.notifier.last_code()))
        .await
        .unwrap();

    let err = h
        .authenticate()
        .execute(&first.access_token, &first.session_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::InvalidSession));

    h.authenticate()
        .execute(&second.access_token, &second.session_token)
        .await
        .unwrap();
}

// ── Password reset ───────────────────────────────────────────────────────────

#[tokio::test]
async fn should_answer_reset_request_for_unknown_email() {
    let h = Harness::new();
    let sent_to = h
        .request_reset()
        .execute("nobody@example.com", &client())
        .await
        .unwrap();
    assert!(sent_to.is_none());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn should_throttle_reset_guesses_per_account_across_addresses() {
    let h = Harness::new();
    h.request_reset()
        .execute(&h.account.email, &client())
        .await
        .unwrap();
    let limiter = RateLimiter::new(
        MemoryCounterStore::new(),
        RateLimitPolicy::mfa(),
        h.shared_clock(),
    );
    let usecase = h.complete_reset();
    let guess = || CompletePasswordResetInput {
        email: " User@Example.com".to_owned(),
        code: "12345x".to_owned(),
        new_password: "attacker chosen".to_owned(),
    };

    for ip in ["198.51.100.1", "198.51.100.2", "198.51.100.3"] {
        let target = usecase.target_account(&guess().email).await.unwrap();
        assert_eq!(target, Some(h.account.id));
        limiter
            .enforce(&ClientContext::new(ip, "rotating"), target)
            .await
            .unwrap();
        let err = usecase.execute(guess()).await.unwrap_err();
        assert!(matches!(err, AuthServiceError::CodeMismatch));
    }

    let target = usecase.target_account(&guess().email).await.unwrap();
    let err = limiter
        .enforce(&ClientContext::new("198.51.100.4", "rotating"), target)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::RateLimited { .. }));

    // Unknown emails fall back to the client address.
    assert_eq!(usecase.target_account("nobody@example.com").await.unwrap(), None);
    limiter
        .enforce(&ClientContext::new("198.51.100.4", "rotating"), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn should_invalidate_tokens_and_sessions_after_reset() {
    let h = Harness::new();
    h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap();
    let tokens = h
        .verify_mfa()
        .execute(mfa_input(&h, h.notifier.last_code()))
        .await
        .unwrap();

    h.request_reset()
        .execute(&h.account.email, &client())
        .await
        .unwrap();
    h.complete_reset()
        .execute(CompletePasswordResetInput {
            email: h.account.email.clone(),
            code: h.notifier.last_code(),
            new_password: "a brand new passphrase".to_owned(),
        })
        .await
        .unwrap();

    assert_eq!(h.accounts.get(h.account.id).token_generation, 1);
    assert!(h.sessions.all().is_empty());
    let err = h
        .authenticate()
        .execute(&tokens.access_token, &tokens.session_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::InvalidToken));

    let err = h.login().execute(login_input(&h, TEST_PASSWORD)).await.unwrap_err();
    assert!(matches!(err, AuthServiceError::InvalidCredentials));
    h.advance(Duration::seconds(1));
    h.login()
        .execute(login_input(&h, "a brand new passphrase"))
        .await
        .unwrap();

    assert!(
        h.notifier
            .sent()
            .iter()
            .any(|m| m.subject == "Your password was changed")
    );
}
