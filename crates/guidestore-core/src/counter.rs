// Shared expiring counters for rate limiting.
//
// The contract is deliberately "shared, expiring counter state" rather than a
// bare in-memory map: single-instance deployments use the memory store below,
// multi-instance deployments plug a shared backend (e.g. Redis) in behind the
// same trait. Fixed-window semantics; a counter resets when its window lapses.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::ApiError;

/// Window and ceiling for one rate-limited operation.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRule {
    /// Window size in seconds.
    pub window: u64,
    /// Maximum operations per window.
    pub max: u64,
}

/// A shared, expiring counter store.
#[async_trait]
pub trait RateLimitStore: Send + Sync + fmt::Debug {
    /// Increment the counter for `key` within a fixed window of
    /// `window_secs`, returning the count including this increment.
    /// A counter whose window has lapsed restarts at 1.
    async fn incr(&self, key: &str, window_secs: u64) -> u64;
}

/// Check one operation against its rule, incrementing the counter.
///
/// Returns a 429 `ApiError` when the count exceeds the rule's ceiling.
pub async fn check_rate_limit(
    store: &dyn RateLimitStore,
    key: &str,
    rule: RateLimitRule,
) -> Result<(), ApiError> {
    let count = store.incr(key, rule.window).await;
    if count > rule.max {
        Err(ApiError::too_many_requests())
    } else {
        Ok(())
    }
}

// ─── In-Memory Store ─────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CounterEntry {
    count: u64,
    window_start: Instant,
}

/// Process-local counter store. Counters reset on redeploy; use a shared
/// backend in multi-instance deployments.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    entries: Mutex<HashMap<String, CounterEntry>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries whose window lapsed more than one window ago.
    pub fn cleanup(&self, window_secs: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, entry| {
            now.duration_since(entry.window_start) < Duration::from_secs(window_secs * 2)
        });
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn incr(&self, key: &str, window_secs: u64) -> u64 {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let window = Duration::from_secs(window_secs);

        let entry = entries.entry(key.to_string()).or_insert(CounterEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        entry.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_within_window() {
        let store = MemoryRateLimitStore::new();
        assert_eq!(store.incr("ip:login", 60).await, 1);
        assert_eq!(store.incr("ip:login", 60).await, 2);
        assert_eq!(store.incr("ip:login", 60).await, 3);
    }

    #[tokio::test]
    async fn separate_keys_are_independent() {
        let store = MemoryRateLimitStore::new();
        assert_eq!(store.incr("a:login", 60).await, 1);
        assert_eq!(store.incr("b:login", 60).await, 1);
    }

    #[tokio::test]
    async fn check_blocks_over_ceiling() {
        let store = MemoryRateLimitStore::new();
        let rule = RateLimitRule { window: 60, max: 2 };

        assert!(check_rate_limit(&store, "ip", rule).await.is_ok());
        assert!(check_rate_limit(&store, "ip", rule).await.is_ok());
        let err = check_rate_limit(&store, "ip", rule).await.unwrap_err();
        assert_eq!(err.status.status_code(), 429);
    }

    #[tokio::test]
    async fn lapsed_window_resets() {
        let store = MemoryRateLimitStore::new();
        // Window of zero seconds lapses immediately, so every increment restarts.
        assert_eq!(store.incr("ip", 0).await, 1);
        assert_eq!(store.incr("ip", 0).await, 1);
    }

    #[tokio::test]
    async fn cleanup_keeps_recent_entries() {
        let store = MemoryRateLimitStore::new();
        store.incr("ip", 60).await;
        store.cleanup(60);
        let entries = store.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
    }
}
