use chrono::Duration;

use gatekeep_auth::domain::types::ActionKind;
use gatekeep_auth::error::AuthServiceError;

use crate::helpers::{Harness, client};

#[tokio::test]
async fn should_issue_six_digit_code_that_verifies_once() {
    let h = Harness::new();
    let otp = h.otp();
    let code = otp
        .create_code(h.account.id, ActionKind::Login, &client())
        .await
        .unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    otp.verify_code(h.account.id, &code, ActionKind::Login)
        .await
        .unwrap();
    let err = otp
        .verify_code(h.account.id, &code, ActionKind::Login)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::CodeAlreadyUsed));
}

#[tokio::test]
async fn should_expire_code_after_five_minutes() {
    let h = Harness::new();
    let otp = h.otp();
    let code = otp
        .create_code(h.account.id, ActionKind::Login, &client())
        .await
        .unwrap();

    h.advance(Duration::seconds(301));
    let err = otp
        .verify_code(h.account.id, &code, ActionKind::Login)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::CodeExpired));
}

#[tokio::test]
async fn should_accept_code_at_exact_expiry() {
    let h = Harness::new();
    let otp = h.otp();
    let code = otp
        .create_code(h.account.id, ActionKind::Login, &client())
        .await
        .unwrap();

    h.advance(Duration::seconds(300));
    otp.verify_code(h.account.id, &code, ActionKind::Login)
        .await
        .unwrap();
}

#[tokio::test]
async fn should_supersede_previous_code_on_resend() {
    let h = Harness::new();
    let otp = h.otp();
    let first = otp
        .create_code(h.account.id, ActionKind::Login, &client())
        .await
        .unwrap();
    h.advance(Duration::seconds(10));
    let second = otp
        .create_code(h.account.id, ActionKind::Login, &client())
        .await
        .unwrap();

    if first != second {
        let err = otp
            .verify_code(h.account.id, &first, ActionKind::Login)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::CodeAlreadyUsed));
    }
    otp.verify_code(h.account.id, &second, ActionKind::Login)
        .await
        .unwrap();

    let active = h.codes.all().into_iter().filter(|c| !c.used).count();
    assert_eq!(active, 0);
}

#[tokio::test]
async fn should_scope_codes_to_action() {
    let h = Harness::new();
    let otp = h.otp();
    let code = otp
        .create_code(h.account.id, ActionKind::PasswordReset, &client())
        .await
        .unwrap();

    let err = otp
        .verify_code(h.account.id, &code, ActionKind::Login)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::CodeMismatch));

    // The reset code is still usable for its own action.
    otp.verify_code(h.account.id, &code, ActionKind::PasswordReset)
        .await
        .unwrap();
}

#[tokio::test]
async fn should_reject_unknown_code_as_mismatch() {
    let h = Harness::new();
    let otp = h.otp();
    let code = otp
        .create_code(h.account.id, ActionKind::Login, &client())
        .await
        .unwrap();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let err = otp
        .verify_code(h.account.id, wrong, ActionKind::Login)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthServiceError::CodeMismatch));
}

#[tokio::test]
async fn should_let_only_one_concurrent_verification_win() {
    let h = Harness::new();
    let otp = h.otp();
    let code = otp
        .create_code(h.account.id, ActionKind::Login, &client())
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        otp.verify_code(h.account.id, &code, ActionKind::Login),
        otp.verify_code(h.account.id, &code, ActionKind::Login),
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
}
