use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sea_orm::Database;
use tracing::{info, warn};

use gatekeep_auth::config::AuthConfig;
use gatekeep_auth::domain::clock::{SharedClock, SystemClock};
use gatekeep_auth::infra::cache::{RedisCounterStore, SharedCounterStore};
use gatekeep_auth::router::build_router;
use gatekeep_auth::state::AppState;
use gatekeep_auth::usecase::credentials::CredentialVerifier;
use gatekeep_auth::usecase::token::SignedCredentialIssuer;
use gatekeep_core::config::Config;
use gatekeep_core::tracing::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AuthConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let counter_store = match &config.redis_url {
        Some(url) => {
            let pool = deadpool_redis::Config::from_url(url)
                .create_pool(Some(deadpool_redis::Runtime::Tokio1))
                .context("failed to create Redis pool")?;
            let store = SharedCounterStore::with_remote(RedisCounterStore::new(
                pool,
                config.store_timeout(),
            ));
            info!(mode = store.mode().await.as_str(), "counter store ready");
            store
        }
        None => {
            warn!("REDIS_URL not set, rate limits are per instance");
            SharedCounterStore::local_only()
        }
    };

    if !config.trust_forwarded_headers {
        info!("forwarding headers ignored, client address is the socket peer");
    }

    let clock: SharedClock = Arc::new(SystemClock);
    let state = AppState {
        db,
        counter_store,
        issuer: SignedCredentialIssuer::new(&config.jwt_secret, clock.clone()),
        credentials: CredentialVerifier::default(),
        clock,
        code_ttl: config.code_ttl(),
        access_token_ttl: config.access_token_ttl(),
        session_idle: config.session_idle(),
        trust_forwarded_headers: config.trust_forwarded_headers,
    };

    let sweeper = state.sessions();
    let interval = config.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = sweeper.sweep_expired().await {
                warn!(error = %e, "idle session sweep failed");
            }
        }
    });

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.auth_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("auth service listening on {addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;
    Ok(())
}
