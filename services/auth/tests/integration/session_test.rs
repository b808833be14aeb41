use chrono::Duration;
use uuid::Uuid;

use gatekeep_auth::domain::types::ClientContext;
use gatekeep_auth::usecase::session::SessionRegistry;

use crate::helpers::{Harness, MockSessionRepo, client};

#[tokio::test]
async fn should_keep_only_newest_session() {
    let h = Harness::new();
    let registry = h.registry();
    let first = registry.create_session(h.account.id, &client()).await.unwrap();
    h.advance(Duration::seconds(5));
    let second = registry
        .create_session(h.account.id, &ClientContext::new("198.51.100.4", "other-device"))
        .await
        .unwrap();

    assert_ne!(first, second);
    assert!(registry.resolve(&first).await.unwrap().is_none());
    let live = registry.resolve(&second).await.unwrap().unwrap();
    assert_eq!(live.client_ip, "198.51.100.4");
    assert_eq!(registry.list_sessions(h.account.id).await.unwrap().len(), 1);
}

/// Create a session after yielding `yields` times, so completion order is fixed.
async fn create_after_yields(
    registry: &SessionRegistry<MockSessionRepo>,
    account_id: Uuid,
    client: &ClientContext,
    yields: usize,
) -> String {
    for _ in 0..yields {
        tokio::task::yield_now().await;
    }
    registry.create_session(account_id, client).await.unwrap()
}

#[tokio::test]
async fn should_keep_session_from_last_completed_create() {
    let h = Harness::new();
    let registry = h.registry();
    let c = client();
    let (last, middle, first) = tokio::join!(
        create_after_yields(&registry, h.account.id, &c, 2),
        create_after_yields(&registry, h.account.id, &c, 1),
        create_after_yields(&registry, h.account.id, &c, 0),
    );

    let sessions = h.sessions.all();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].token, last);
    assert!(registry.resolve(&first).await.unwrap().is_none());
    assert!(registry.resolve(&middle).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_leave_exactly_one_session_after_parallel_creates() {
    let h = Harness::new();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = h.registry();
            let account_id = h.account.id;
            tokio::spawn(async move {
                registry
                    .create_session(account_id, &client())
                    .await
                    .unwrap()
            })
        })
        .collect();
    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(handle.await.unwrap());
    }

    let sessions = h.sessions.all();
    assert_eq!(sessions.len(), 1);
    assert!(tokens.contains(&sessions[0].token));
}

#[tokio::test]
async fn should_not_touch_other_accounts() {
    let h = Harness::new();
    let registry = h.registry();
    let other = Uuid::now_v7();
    let other_token = registry.create_session(other, &client()).await.unwrap();
    registry.create_session(h.account.id, &client()).await.unwrap();

    assert!(registry.resolve(&other_token).await.unwrap().is_some());
    assert_eq!(h.sessions.all().len(), 2);
}

#[tokio::test]
async fn should_treat_touch_of_missing_session_as_noop() {
    let h = Harness::new();
    h.registry().touch("no-such-token").await.unwrap();
    assert!(h.sessions.all().is_empty());
}

#[tokio::test]
async fn should_refresh_activity_on_touch() {
    let h = Harness::new();
    let registry = h.registry();
    let token = registry.create_session(h.account.id, &client()).await.unwrap();

    h.advance(Duration::hours(20));
    registry.touch(&token).await.unwrap();
    h.advance(Duration::hours(20));

    // 40h since creation but only 20h idle.
    assert!(registry.resolve(&token).await.unwrap().is_some());
}

#[tokio::test]
async fn should_drop_idle_session_on_resolve() {
    let h = Harness::new();
    let registry = h.registry();
    let token = registry.create_session(h.account.id, &client()).await.unwrap();

    h.advance(Duration::hours(24) + Duration::seconds(1));
    assert!(registry.resolve(&token).await.unwrap().is_none());
    assert!(h.sessions.all().is_empty());
}

#[tokio::test]
async fn should_revoke_idempotently() {
    let h = Harness::new();
    let registry = h.registry();
    let token = registry.create_session(h.account.id, &client()).await.unwrap();
    let session = registry.resolve(&token).await.unwrap().unwrap();

    registry.revoke(session.id).await.unwrap();
    registry.revoke(session.id).await.unwrap();
    registry.revoke_by_token(&token).await.unwrap();
    assert_eq!(registry.revoke_all(h.account.id).await.unwrap(), 0);
}

#[tokio::test]
async fn should_sweep_only_idle_sessions() {
    let h = Harness::new();
    let registry = h.registry();
    let stale = Uuid::now_v7();
    registry.create_session(stale, &client()).await.unwrap();

    h.advance(Duration::hours(23));
    let fresh_token = registry.create_session(h.account.id, &client()).await.unwrap();
    h.advance(Duration::hours(2));

    assert_eq!(registry.sweep_expired().await.unwrap(), 1);
    assert_eq!(h.sessions.all().len(), 1);
    assert!(registry.resolve(&fresh_token).await.unwrap().is_some());
}
