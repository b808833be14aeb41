use std::time::Duration;

use serde::Deserialize;

use gatekeep_core::config::Config;

use crate::domain::types::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_CODE_TTL_SECS, DEFAULT_SESSION_IDLE_SECS,
};

/// Upper bound on any single counter store call.
pub const MAX_STORE_TIMEOUT_MS: u64 = 2_000;

/// Auth service configuration loaded from environment variables.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL. Without it rate limiting runs on in-process counters only.
    pub redis_url: Option<String>,
    /// HMAC secret for signing access tokens.
    pub jwt_secret: String,
    /// TCP port to listen on. Env var: `AUTH_PORT`.
    #[serde(default = "default_port")]
    pub auth_port: u16,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: i64,
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: i64,
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: i64,
    #[serde(default = "default_session_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,
    /// Take the client address from `x-forwarded-for` / `x-real-ip`. Enable only
    /// behind a reverse proxy that overwrites those headers.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

impl Config for AuthConfig {}

fn default_port() -> u16 {
    3112
}

fn default_store_timeout_ms() -> u64 {
    1_500
}

fn default_code_ttl_secs() -> i64 {
    DEFAULT_CODE_TTL_SECS
}

fn default_access_token_ttl_secs() -> i64 {
    DEFAULT_ACCESS_TOKEN_TTL_SECS
}

fn default_session_idle_secs() -> i64 {
    DEFAULT_SESSION_IDLE_SECS
}

fn default_session_sweep_interval_secs() -> u64 {
    600
}

impl AuthConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms.min(MAX_STORE_TIMEOUT_MS))
    }

    pub fn code_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.code_ttl_secs)
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_ttl_secs)
    }

    pub fn session_idle(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_idle_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs.max(1))
    }
}
