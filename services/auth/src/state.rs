use chrono::Duration;
use sea_orm::DatabaseConnection;

use crate::domain::clock::SharedClock;
use crate::infra::cache::SharedCounterStore;
use crate::infra::db::{
    DbAccountRepository, DbLoginAttemptRepository, DbOneTimeCodeRepository, DbSessionRepository,
};
use crate::infra::outbox::OutboxNotifier;
use crate::usecase::credentials::CredentialVerifier;
use crate::usecase::lockout::{LockoutEngine, LockoutPolicy};
use crate::usecase::otp::OneTimeCodeService;
use crate::usecase::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::usecase::session::SessionRegistry;
use crate::usecase::token::SignedCredentialIssuer;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub counter_store: SharedCounterStore,
    pub issuer: SignedCredentialIssuer,
    pub credentials: CredentialVerifier,
    pub clock: SharedClock,
    pub code_ttl: Duration,
    pub access_token_ttl: Duration,
    pub session_idle: Duration,
    pub trust_forwarded_headers: bool,
}

impl AppState {
    pub fn account_repo(&self) -> DbAccountRepository {
        DbAccountRepository {
            db: self.db.clone(),
        }
    }

    pub fn login_attempt_repo(&self) -> DbLoginAttemptRepository {
        DbLoginAttemptRepository {
            db: self.db.clone(),
        }
    }

    pub fn code_repo(&self) -> DbOneTimeCodeRepository {
        DbOneTimeCodeRepository {
            db: self.db.clone(),
        }
    }

    pub fn session_repo(&self) -> DbSessionRepository {
        DbSessionRepository {
            db: self.db.clone(),
        }
    }

    pub fn notifier(&self) -> OutboxNotifier {
        OutboxNotifier {
            db: self.db.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn lockout(&self) -> LockoutEngine<DbAccountRepository, DbLoginAttemptRepository> {
        LockoutEngine {
            accounts: self.account_repo(),
            attempts: self.login_attempt_repo(),
            credentials: self.credentials.clone(),
            policy: LockoutPolicy::default(),
            clock: self.clock.clone(),
        }
    }

    pub fn otp(&self) -> OneTimeCodeService<DbOneTimeCodeRepository> {
        OneTimeCodeService {
            codes: self.code_repo(),
            clock: self.clock.clone(),
            ttl: self.code_ttl,
        }
    }

    pub fn sessions(&self) -> SessionRegistry<DbSessionRepository> {
        SessionRegistry {
            sessions: self.session_repo(),
            clock: self.clock.clone(),
            idle_timeout: self.session_idle,
        }
    }

    pub fn limiter(&self, policy: RateLimitPolicy) -> RateLimiter<SharedCounterStore> {
        RateLimiter::new(self.counter_store.clone(), policy, self.clock.clone())
    }
}
