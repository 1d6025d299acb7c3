//! Serving configuration
//!
//! One struct covering every knob the serving layer reads, loaded once
//! at startup from a file plus environment overrides. There is no hot
//! reload: a config change means a restart.

use crate::cache::CacheConfig;
use crate::fallback::FallbackConfig;
use crate::rate_limit::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid config value: {0}")]
    InvalidValue(&'static str),
}

/// Configuration for the serving layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Per-kind cache TTLs
    #[serde(default)]
    pub cache: CacheConfig,

    /// Request ceiling and window
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// External provider switch, endpoint, and confidence floor
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Maximum inferences in flight at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_inferences: usize,

    /// Delay between provider polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Overall deadline for one provider job (submit + all polls), in
    /// milliseconds
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_poll_timeout_ms() -> u64 {
    30_000
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            fallback: FallbackConfig::default(),
            max_concurrent_inferences: default_max_concurrent(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl ServingConfig {
    /// Load from a config file (TOML/JSON/YAML by extension), with
    /// `TRESS_*` environment variables layered on top
    /// (e.g. `TRESS_RATE_LIMIT__MAX_REQUESTS=100`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("TRESS").separator("__"))
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that cannot work before anything starts up.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_inferences == 0 {
            return Err(ConfigError::InvalidValue(
                "max_concurrent_inferences must be > 0",
            ));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidValue("rate_limit.max_requests must be > 0"));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidValue("rate_limit.window_secs must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.fallback.min_confidence) {
            return Err(ConfigError::InvalidValue(
                "fallback.min_confidence must be between 0.0 and 1.0",
            ));
        }
        if self.fallback.enabled && self.fallback.endpoint.is_none() {
            return Err(ConfigError::InvalidValue(
                "fallback.endpoint is required when fallback.enabled is true",
            ));
        }
        if self.poll_interval_ms == 0 || self.poll_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "poll intervals must be > 0",
            ));
        }
        if self.poll_timeout_ms < self.poll_interval_ms {
            return Err(ConfigError::InvalidValue(
                "poll_timeout_ms must be at least poll_interval_ms",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
