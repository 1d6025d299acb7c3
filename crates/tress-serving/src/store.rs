//! Key-value store backend
//!
//! The result cache and the rate limiter share one backing store behind
//! the [`KvStore`] trait. The trait is deliberately small: string values
//! with TTLs, plus an atomic counter increment whose expiry is set only
//! by the call that creates the counter (fixed windows, not sliding).
//!
//! Store failures are expected operational events, not bugs: callers
//! above this layer degrade to "miss" or "allowed" and log, they never
//! fail a request because the store is down.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Backing-store error types
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store is unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A reachable store failed the operation
    #[error("store operation failed: {0}")]
    Operation(String),
}

/// Result of an atomic counter increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterValue {
    /// Counter value after this increment
    pub count: u64,
    /// True when this increment created the counter (first in its window)
    pub created: bool,
    /// Time remaining until the counter expires
    pub expires_in: Duration,
}

/// Minimal key-value contract shared by the cache and the rate limiter.
///
/// Implementations must make `incr` atomic from the caller's point of
/// view: increment-then-conditionally-expire is one operation, never two
/// racing ones.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically increment the counter at `key`. The expiry is set to
    /// `window` only when the counter does not yet exist (or has
    /// expired); later increments leave the window end untouched.
    async fn incr(&self, key: &str, window: Duration) -> Result<CounterValue, StoreError>;

    /// Read a counter without incrementing it
    async fn peek(&self, key: &str) -> Result<Option<CounterValue>, StoreError>;

    /// Remove a key; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

struct ValueEntry {
    value: String,
    expires_at: Instant,
}

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

/// Thread-safe in-memory store with expiry.
///
/// The production deployment points the serving layer at a shared store
/// process; this implementation backs tests, development, and
/// single-node setups. `set_connected(false)` simulates an outage.
pub struct MemoryStore {
    values: Arc<RwLock<HashMap<String, ValueEntry>>>,
    counters: Arc<RwLock<HashMap<String, CounterEntry>>>,
    connected: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(RwLock::new(HashMap::new())),
            connected: AtomicBool::new(true),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Simulate the store going down (or coming back)
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Drop every expired value and counter
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        self.values.write().await.retain(|_, e| e.expires_at > now);
        self.counters.write().await.retain(|_, e| e.expires_at > now);
    }

    /// Remove all data
    pub async fn clear(&self) {
        self.values.write().await.clear();
        self.counters.write().await.clear();
    }

    fn check_connected(&self) -> Result<(), StoreError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store marked offline".into()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_connected()?;
        let values = self.values.read().await;
        Ok(values
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.check_connected()?;
        let mut values = self.values.write().await;
        values.insert(
            key.to_string(),
            ValueEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str, window: Duration) -> Result<CounterValue, StoreError> {
        self.check_connected()?;

        // The write lock covers the whole read-modify-write, which is
        // what makes the increment atomic for concurrent callers.
        let mut counters = self.counters.write().await;
        let now = Instant::now();

        let entry = counters.entry(key.to_string()).or_insert(CounterEntry {
            count: 0,
            expires_at: now, // treated as expired below, triggering creation
        });

        if entry.expires_at <= now {
            entry.count = 1;
            entry.expires_at = now + window;
            debug!(key, window_secs = window.as_secs(), "counter window opened");
            return Ok(CounterValue {
                count: 1,
                created: true,
                expires_in: window,
            });
        }

        entry.count += 1;
        Ok(CounterValue {
            count: entry.count,
            created: false,
            expires_in: entry.expires_at - now,
        })
    }

    async fn peek(&self, key: &str) -> Result<Option<CounterValue>, StoreError> {
        self.check_connected()?;
        let counters = self.counters.read().await;
        let now = Instant::now();
        Ok(counters
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| CounterValue {
                count: e.count,
                created: false,
                expires_in: e.expires_at - now,
            }))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check_connected()?;
        let removed_value = self.values.write().await.remove(key).is_some();
        let removed_counter = self.counters.write().await.remove(key).is_some();
        Ok(removed_value || removed_counter)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("k", "v".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".into()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_value_expires() {
        let store = MemoryStore::new();
        store
            .put("k", "v".into(), Duration::from_millis(30))
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_creates_then_increments() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);

        let first = store.incr("c", window).await.unwrap();
        assert_eq!(first.count, 1);
        assert!(first.created);

        let second = store.incr("c", window).await.unwrap();
        assert_eq!(second.count, 2);
        assert!(!second.created);
        assert!(second.expires_in <= window);
    }

    #[tokio::test]
    async fn test_incr_window_is_fixed_not_sliding() {
        let store = MemoryStore::new();
        let window = Duration::from_millis(80);

        store.incr("c", window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // A later increment must not push the window end out
        let second = store.incr("c", window).await.unwrap();
        assert!(!second.created);
        assert!(second.expires_in < Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_incr_resets_after_window() {
        let store = MemoryStore::new();
        let window = Duration::from_millis(40);

        store.incr("c", window).await.unwrap();
        store.incr("c", window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(70)).await;

        let fresh = store.incr("c", window).await.unwrap();
        assert_eq!(fresh.count, 1);
        assert!(fresh.created);
    }

    #[tokio::test]
    async fn test_concurrent_incr_counts_every_call() {
        let store = MemoryStore::shared();
        let window = Duration::from_secs(60);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.incr("c", window).await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let snapshot = store.peek("c").await.unwrap().unwrap();
        assert_eq!(snapshot.count, 20);
    }

    #[tokio::test]
    async fn test_peek_does_not_increment() {
        let store = MemoryStore::new();
        assert_eq!(store.peek("c").await.unwrap(), None);

        store.incr("c", Duration::from_secs(60)).await.unwrap();
        store.peek("c").await.unwrap();
        let snapshot = store.peek("c").await.unwrap().unwrap();
        assert_eq!(snapshot.count, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store
            .put("k", "v".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_store_errors() {
        let store = MemoryStore::new();
        store.set_connected(false);

        assert!(matches!(
            store.get("k").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.incr("c", Duration::from_secs(1)).await.is_err());

        store.set_connected(true);
        assert!(store.get("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store
            .put("short", "v".into(), Duration::from_millis(10))
            .await
            .unwrap();
        store
            .put("long", "v".into(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        store.purge_expired().await;

        assert_eq!(store.values.read().await.len(), 1);
        assert!(store.get("long").await.unwrap().is_some());
    }
}
