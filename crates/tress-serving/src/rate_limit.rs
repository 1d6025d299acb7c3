//! Request rate limiting
//!
//! Fixed-window counting on the shared key-value store: the window
//! opens on the increment that creates the counter and does not slide
//! on later calls. An unreachable store degrades to always-allowed:
//! availability is prioritized over limiter correctness.

use crate::store::KvStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u64,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_secs: 60,
        }
    }
}

/// Outcome of one rate-limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Count in the current window, including this request
    pub current: u64,
    pub limit: u64,
    /// When the current window closes and the count resets
    pub reset_at: DateTime<Utc>,
}

/// Non-incrementing view of an identifier's current window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub identifier: String,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Fixed-window rate limiter over a [`KvStore`]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    fn counter_key(identifier: &str) -> String {
        format!("ratelimit:{identifier}")
    }

    /// Count this request against `identifier` and decide whether it may
    /// proceed. The store's atomic increment carries the window
    /// semantics; this method only interprets the result.
    pub async fn check(&self, identifier: &str) -> RateLimitDecision {
        self.check_with(
            identifier,
            self.config.max_requests,
            Duration::from_secs(self.config.window_secs),
        )
        .await
    }

    /// `check` with an explicit limit and window for this call
    pub async fn check_with(
        &self,
        identifier: &str,
        limit: u64,
        window: Duration,
    ) -> RateLimitDecision {
        let key = Self::counter_key(identifier);

        match self.store.incr(&key, window).await {
            Ok(counter) => {
                let allowed = counter.count <= limit;
                let reset_at = Utc::now()
                    + chrono::Duration::from_std(counter.expires_in)
                        .unwrap_or_else(|_| chrono::Duration::seconds(window.as_secs() as i64));

                if allowed {
                    debug!(
                        identifier,
                        current = counter.count,
                        limit,
                        "rate limit check passed"
                    );
                } else {
                    debug!(
                        identifier,
                        current = counter.count,
                        limit,
                        "rate limit exceeded"
                    );
                }

                RateLimitDecision {
                    allowed,
                    current: counter.count,
                    limit,
                    reset_at,
                }
            }
            Err(e) => {
                // Store down: let the request through rather than reject it
                warn!(identifier, error = %e, "rate limit store unavailable, allowing request");
                RateLimitDecision {
                    allowed: true,
                    current: 0,
                    limit,
                    reset_at: Utc::now(),
                }
            }
        }
    }

    /// Current window for `identifier` without counting a request
    pub async fn status(&self, identifier: &str) -> Option<RateLimitStatus> {
        let key = Self::counter_key(identifier);
        match self.store.peek(&key).await {
            Ok(Some(counter)) => Some(RateLimitStatus {
                identifier: identifier.to_string(),
                limit: self.config.max_requests,
                remaining: self.config.max_requests.saturating_sub(counter.count),
                reset_at: Utc::now()
                    + chrono::Duration::from_std(counter.expires_in)
                        .unwrap_or_else(|_| chrono::Duration::zero()),
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(identifier, error = %e, "rate limit status read failed");
                None
            }
        }
    }

    /// Clear an identifier's window (admin operation); returns whether a
    /// counter existed
    pub async fn reset(&self, identifier: &str) -> bool {
        let key = Self::counter_key(identifier);
        match self.store.delete(&key).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(identifier, error = %e, "rate limit reset failed");
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
