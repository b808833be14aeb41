use chrono::Duration;

use gatekeep_auth::domain::types::FailureReason;
use gatekeep_auth::error::AuthServiceError;
use gatekeep_auth::usecase::login::{LoginInput, UnlockMethod};

use crate::helpers::{Harness, TEST_PASSWORD, TEST_PIN, client, t0};

async fn fail(h: &Harness, times: usize) {
    let lockout = h.lockout();
    for _ in 0..times {
        lockout
            .record_failed_attempt(
                Some(h.account.id),
                &h.account.email,
                &client(),
                FailureReason::WrongPassword,
            )
            .await
            .unwrap();
    }
}

// ── Temporary blocks ─────────────────────────────────────────────────────────

#[tokio::test]
async fn should_block_for_one_minute_after_five_failures() {
    let h = Harness::new();
    let start = t0();
    fail(&h, 4).await;
    assert!(!h.lockout().check_block(h.account.id).await.unwrap().blocked);

    fail(&h, 1).await;
    let status = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(status.blocked);
    assert_eq!(status.attempt_count, 5);
    assert_eq!(status.unlock_at, Some(start + Duration::minutes(1)));
    assert!(!status.requires_pin_unlock);
    assert!(!status.requires_security_question);
    assert!(status.security_question.is_none());
}

#[tokio::test]
async fn should_clear_block_once_unlock_time_passes() {
    let h = Harness::new();
    fail(&h, 5).await;
    assert!(h.accounts.get(h.account.id).blocked);

    h.advance(Duration::seconds(61));
    let status = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(!status.blocked);

    let account = h.accounts.get(h.account.id);
    assert!(!account.blocked);
    assert!(account.block_started_at.is_none());
}

#[tokio::test]
async fn should_report_blocked_right_up_to_unlock_time() {
    let h = Harness::new();
    fail(&h, 5).await;

    h.advance(Duration::seconds(59));
    assert!(h.lockout().check_block(h.account.id).await.unwrap().blocked);

    h.advance(Duration::seconds(1));
    assert!(!h.lockout().check_block(h.account.id).await.unwrap().blocked);
}

#[tokio::test]
async fn should_escalate_to_longer_block() {
    let h = Harness::new();
    let start = t0();
    fail(&h, 8).await;

    let status = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(status.blocked);
    assert_eq!(status.unlock_at, Some(start + Duration::minutes(5)));
}

#[tokio::test]
async fn should_forget_failures_outside_audit_horizon() {
    let h = Harness::new();
    fail(&h, 12).await;

    h.advance(Duration::hours(25));
    let status = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(!status.blocked);
    assert_eq!(status.attempt_count, 0);
    assert!(!h.accounts.get(h.account.id).blocked);
}

#[tokio::test]
async fn should_count_attempts_made_while_blocked() {
    let h = Harness::new();
    fail(&h, 5).await;

    let err = h
        .login()
        .execute(LoginInput {
            email: h.account.email.clone(),
            password: TEST_PASSWORD.to_owned(),
            client: client(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::AccountBlocked { .. }));
    assert_eq!(h.lockout().failure_count(h.account.id).await.unwrap(), 6);
}

// ── Success resets the count ─────────────────────────────────────────────────

#[tokio::test]
async fn should_reset_count_after_successful_login() {
    let h = Harness::new();
    fail(&h, 4).await;

    h.advance(Duration::seconds(1));
    h.lockout()
        .record_successful_attempt(h.account.id, &h.account.email, &client())
        .await
        .unwrap();
    h.advance(Duration::seconds(1));
    fail(&h, 1).await;

    let status = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(!status.blocked);
    assert_eq!(status.attempt_count, 1);
    // Audit rows are kept.
    assert_eq!(h.attempts.all().len(), 6);
}

#[tokio::test]
async fn should_clear_idempotently() {
    let h = Harness::new();
    fail(&h, 5).await;

    let lockout = h.lockout();
    lockout.clear_failed_attempts(h.account.id).await.unwrap();
    let once = h.accounts.get(h.account.id);
    lockout.clear_failed_attempts(h.account.id).await.unwrap();
    let twice = h.accounts.get(h.account.id);

    assert!(!once.blocked);
    assert_eq!(once.blocked, twice.blocked);
    assert_eq!(once.block_started_at, twice.block_started_at);
}

// ── Permanent blocks ─────────────────────────────────────────────────────────

#[tokio::test]
async fn should_block_permanently_after_twenty_failures() {
    let h = Harness::new();
    fail(&h, 20).await;

    let status = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(status.blocked);
    assert!(status.unlock_at.is_none());
    assert!(status.requires_pin_unlock);
    assert!(status.requires_security_question);
    assert_eq!(status.security_question.as_deref(), Some("Favourite animal?"));

    h.advance(Duration::hours(3));
    assert!(h.lockout().check_block(h.account.id).await.unwrap().blocked);
}

#[tokio::test]
async fn should_treat_sixteen_failures_as_permanent() {
    let h = Harness::new();
    fail(&h, 16).await;

    let status = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(status.blocked);
    assert!(status.unlock_at.is_none());
}

#[tokio::test]
async fn should_lift_permanent_block_with_pin() {
    let h = Harness::new();
    fail(&h, 20).await;

    h.unlock()
        .execute(h.account.id, UnlockMethod::Pin, TEST_PIN)
        .await
        .unwrap();
    assert!(!h.lockout().check_block(h.account.id).await.unwrap().blocked);

    // Password login goes through again and resets the count.
    h.advance(Duration::seconds(1));
    h.login()
        .execute(LoginInput {
            email: h.account.email.clone(),
            password: TEST_PASSWORD.to_owned(),
            client: client(),
        })
        .await
        .unwrap();
    assert_eq!(h.lockout().failure_count(h.account.id).await.unwrap(), 0);
}

#[tokio::test]
async fn should_lift_permanent_block_with_normalized_security_answer() {
    let h = Harness::new();
    fail(&h, 20).await;

    h.unlock()
        .execute(h.account.id, UnlockMethod::Security, "  blue   WHALE ")
        .await
        .unwrap();
    assert!(!h.accounts.get(h.account.id).blocked);
}

#[tokio::test]
async fn should_reject_wrong_pin_without_touching_count() {
    let h = Harness::new();
    fail(&h, 20).await;

    let err = h
        .unlock()
        .execute(h.account.id, UnlockMethod::Pin, "0000")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::WrongSecret));

    let status = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(status.blocked);
    assert_eq!(status.attempt_count, 20);
}

#[tokio::test]
async fn should_refuse_unlock_when_not_blocked() {
    let h = Harness::new();
    let err = h
        .unlock()
        .execute(h.account.id, UnlockMethod::Pin, TEST_PIN)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::NotBlocked));
}

#[tokio::test]
async fn should_report_missing_unlock_secret() {
    let h = Harness::new();
    h.accounts.accounts.lock().unwrap()[0].pin_hash = None;
    fail(&h, 20).await;

    let status = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(!status.requires_pin_unlock);
    assert!(status.requires_security_question);

    let err = h
        .unlock()
        .execute(h.account.id, UnlockMethod::Pin, TEST_PIN)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::NoSecretConfigured));
}

#[tokio::test]
async fn should_hide_question_without_configured_answer() {
    let h = Harness::new();
    h.accounts.accounts.lock().unwrap()[0].security_answer_hash = None;
    fail(&h, 20).await;

    let status = h.lockout().check_block(h.account.id).await.unwrap();
    assert!(!status.requires_security_question);
    assert!(status.security_question.is_none());
}
