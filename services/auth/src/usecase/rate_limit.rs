//! Sliding-window request throttling, independent of account lockout.
//!
//! Availability of authentication must not depend on the cache: any store
//! failure makes `is_allowed` fail open.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::clock::SharedClock;
use crate::domain::repository::CounterStore;
use crate::domain::types::ClientContext;
use crate::error::AuthServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    ClientIp,
    /// Target account when resolvable, else client IP.
    AccountOrIp,
}

#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub window: Duration,
    pub max_requests: u64,
    pub strategy: KeyStrategy,
    pub message: &'static str,
}

impl RateLimitPolicy {
    pub fn login() -> Self {
        Self {
            name: "login",
            window: Duration::minutes(15),
            max_requests: 5,
            strategy: KeyStrategy::ClientIp,
            message: "too many login attempts, try again later",
        }
    }

    pub fn mfa() -> Self {
        Self {
            name: "mfa",
            window: Duration::minutes(5),
            max_requests: 3,
            strategy: KeyStrategy::AccountOrIp,
            message: "too many verification attempts, try again later",
        }
    }

    pub fn password_reset() -> Self {
        Self {
            name: "password_reset",
            window: Duration::hours(1),
            max_requests: 3,
            strategy: KeyStrategy::ClientIp,
            message: "too many password reset requests, try again later",
        }
    }

    pub fn api() -> Self {
        Self {
            name: "api",
            window: Duration::minutes(1),
            max_requests: 100,
            strategy: KeyStrategy::ClientIp,
            message: "too many requests, slow down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_time: DateTime<Utc>,
    pub message: Option<String>,
}

impl RateLimitDecision {
    /// Whole seconds until `reset_time`, at least 1.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_time - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000).max(1)
    }
}

pub struct RateLimiter<C: CounterStore> {
    pub store: C,
    pub policy: RateLimitPolicy,
    pub clock: SharedClock,
}

impl<C: CounterStore> RateLimiter<C> {
    pub fn new(store: C, policy: RateLimitPolicy, clock: SharedClock) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn derive_key(&self, client: &ClientContext, account_id: Option<Uuid>) -> String {
        match (self.policy.strategy, account_id) {
            (KeyStrategy::AccountOrIp, Some(id)) => format!("rl:{}:acct:{id}", self.policy.name),
            _ => format!("rl:{}:ip:{}", self.policy.name, client.ip),
        }
    }

    pub async fn is_allowed(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let window_ms = self.policy.window.num_milliseconds();
        let hit = match self
            .store
            .record_hit(key, now.timestamp_millis(), window_ms, self.policy.max_requests)
            .await
        {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, limiter = self.policy.name, key, "rate limit check failed open");
                return RateLimitDecision {
                    allowed: true,
                    remaining: self.policy.max_requests,
                    reset_time: now + self.policy.window,
                    message: None,
                };
            }
        };

        let reset_time = Utc
            .timestamp_millis_opt(hit.oldest_ms + window_ms)
            .single()
            .unwrap_or(now + self.policy.window);

        if hit.allowed {
            RateLimitDecision {
                allowed: true,
                remaining: self.policy.max_requests.saturating_sub(hit.count),
                reset_time,
                message: None,
            }
        } else {
            info!(limiter = self.policy.name, key, "rate limit exceeded");
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_time,
                message: Some(self.policy.message.to_owned()),
            }
        }
    }

    /// Derive the key, record the hit and turn a rejection into `RateLimited`.
    pub async fn enforce(
        &self,
        client: &ClientContext,
        account_id: Option<Uuid>,
    ) -> Result<RateLimitDecision, AuthServiceError> {
        let decision = self.is_allowed(&self.derive_key(client, account_id)).await;
        if decision.allowed {
            return Ok(decision);
        }
        Err(AuthServiceError::RateLimited {
            retry_after_secs: decision.retry_after_secs(self.clock.now()),
            message: decision
                .message
                .unwrap_or_else(|| self.policy.message.to_owned()),
        })
    }
}
