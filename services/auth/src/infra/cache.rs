use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deadpool_redis::Pool;
use deadpool_redis::redis::{self, Script};
use tracing::warn;
use uuid::Uuid;

use crate::domain::repository::CounterStore;
use crate::domain::types::WindowHit;
use crate::error::StoreError;

/// Evict, count, conditionally add and refresh the TTL in one server-side step.
/// Returns `{allowed, count, oldest_score}`.
const SLIDING_WINDOW_LUA: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local max = tonumber(ARGV[3])
local member = ARGV[4]
redis.call('ZREMRANGEBYSCORE', key, '-inf', '(' .. (now - window))
local count = redis.call('ZCARD', key)
local allowed = 0
if count < max then
  redis.call('ZADD', key, now, member)
  count = count + 1
  allowed = 1
end
redis.call('PEXPIRE', key, window)
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
local oldest_score = now
if oldest[2] then
  oldest_score = tonumber(oldest[2])
end
return {allowed, count, oldest_score}
"#;

// ── Redis ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RedisCounterStore {
    pool: Pool,
    timeout: Duration,
    script: Arc<Script>,
}

impl RedisCounterStore {
    pub fn new(pool: Pool, timeout: Duration) -> Self {
        Self {
            pool,
            timeout,
            script: Arc::new(Script::new(SLIDING_WINDOW_LUA)),
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl CounterStore for RedisCounterStore {
    async fn record_hit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        max: u64,
    ) -> Result<WindowHit, StoreError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let member = format!("{now_ms}-{}", Uuid::new_v4().simple());
            let reply: Vec<i64> = self
                .script
                .key(key)
                .arg(now_ms)
                .arg(window_ms)
                .arg(max)
                .arg(member)
                .invoke_async(&mut conn)
                .await
                .map_err(|e: redis::RedisError| StoreError::Unavailable(e.to_string()))?;
            match reply.as_slice() {
                [allowed, count, oldest] => Ok(WindowHit {
                    allowed: *allowed == 1,
                    count: (*count).max(0) as u64,
                    oldest_ms: *oldest,
                }),
                other => Err(StoreError::Protocol(format!("{other:?}"))),
            }
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e: redis::RedisError| StoreError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }
}

// ── In-process ────────────────────────────────────────────────────────────────

/// Sweep stale keys once the map grows past this many entries.
const LOCAL_SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug)]
struct LocalWindow {
    markers: VecDeque<i64>,
    window_ms: i64,
}

/// Same sliding-window semantics as Redis, scoped to this process.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    windows: Arc<Mutex<HashMap<String, LocalWindow>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn hit(&self, key: &str, now_ms: i64, window_ms: i64, max: u64) -> WindowHit {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() > LOCAL_SWEEP_THRESHOLD {
            windows.retain(|_, w| {
                w.markers
                    .back()
                    .is_some_and(|last| *last >= now_ms - w.window_ms)
            });
        }

        let window = windows
            .entry(key.to_owned())
            .or_insert_with(|| LocalWindow {
                markers: VecDeque::new(),
                window_ms,
            });
        window.window_ms = window_ms;

        let cutoff = now_ms - window_ms;
        while window.markers.front().is_some_and(|t| *t < cutoff) {
            window.markers.pop_front();
        }

        let allowed = (window.markers.len() as u64) < max;
        if allowed {
            window.markers.push_back(now_ms);
        }

        WindowHit {
            allowed,
            count: window.markers.len() as u64,
            oldest_ms: window.markers.front().copied().unwrap_or(now_ms),
        }
    }
}

impl CounterStore for MemoryCounterStore {
    async fn record_hit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        max: u64,
    ) -> Result<WindowHit, StoreError> {
        Ok(self.hit(key, now_ms, window_ms, max))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ── Remote with in-process fallback ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Redis configured and reachable.
    Remote,
    /// Redis configured but unreachable; serving from process memory.
    Degraded,
    /// No Redis configured.
    Local,
}

impl StoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Degraded => "degraded",
            Self::Local => "local",
        }
    }
}

/// The counter store handed to every rate limiter. Built once at startup.
///
/// Calls go to Redis when configured; any [`StoreError`] is logged and the call
/// is answered by the in-process store instead. In that mode counts are not
/// shared across instances.
#[derive(Clone)]
pub struct SharedCounterStore {
    remote: Option<RedisCounterStore>,
    local: MemoryCounterStore,
}

impl SharedCounterStore {
    pub fn with_remote(remote: RedisCounterStore) -> Self {
        Self {
            remote: Some(remote),
            local: MemoryCounterStore::new(),
        }
    }

    pub fn local_only() -> Self {
        Self {
            remote: None,
            local: MemoryCounterStore::new(),
        }
    }

    pub async fn mode(&self) -> StoreMode {
        match &self.remote {
            None => StoreMode::Local,
            Some(remote) => match remote.ping().await {
                Ok(()) => StoreMode::Remote,
                Err(_) => StoreMode::Degraded,
            },
        }
    }
}

impl CounterStore for SharedCounterStore {
    async fn record_hit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        max: u64,
    ) -> Result<WindowHit, StoreError> {
        if let Some(remote) = &self.remote {
            match remote.record_hit(key, now_ms, window_ms, max).await {
                Ok(hit) => return Ok(hit),
                Err(e) => {
                    warn!(error = %e, key, "counter store unreachable, using in-process window");
                }
            }
        }
        self.local.record_hit(key, now_ms, window_ms, max).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        match &self.remote {
            Some(remote) => remote.ping().await,
            None => Ok(()),
        }
    }
}
