//! # tress-serving
//!
//! Serving layer around the hair-analysis runtime. One entry point,
//! [`InferenceOrchestrator::analyze`], walks each request through a
//! content-addressed result cache, a fixed-window rate limiter, bounded
//! local inference, and a rule-driven local/external fallback decision.
//!
//! The cache and rate limiter share one key-value store and both fail
//! open: an unreachable store costs the speedup and the ceiling, never
//! the request.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tress_inference::{AnalysisInput, ModelConfig, ModelHandle};
//! use tress_serving::{
//!     AnalysisRequest, InferenceOrchestrator, MemoryStore, ServingConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let model = Arc::new(ModelHandle::with_default_engine(
//!         ModelConfig::new("/models/hair-v3.bin").with_model_version("v3"),
//!     ));
//!     let orchestrator = InferenceOrchestrator::new(
//!         model,
//!         MemoryStore::shared(),
//!         None,
//!         ServingConfig::default(),
//!     );
//!
//!     let frame = AnalysisInput::new(vec![0.5; 224 * 224 * 3], 224, 224)?;
//!     let outcome = orchestrator.analyze(AnalysisRequest::new(frame, "caller-1")).await?;
//!     println!("{} via {:?}", outcome.report.primary_label, outcome.source);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod orchestrator;
pub mod provider;
pub mod rate_limit;
pub mod store;

pub use cache::{CacheConfig, CacheKind, ResultCache, StyleRecommendation, fingerprint};
pub use config::{ConfigError, ServingConfig};
pub use error::{ServingError, ServingResult};
pub use fallback::{
    FallbackConfig, FallbackDecision, FallbackReason, RequestSignals, decide_route,
    should_escalate,
};
pub use orchestrator::{AnalysisOutcome, AnalysisRequest, InferenceOrchestrator, ResultSource};
pub use provider::{JobStatus, ProviderError, ProviderRequest, StyleProvider, run_job};
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimitStatus, RateLimiter};
pub use store::{CounterValue, KvStore, MemoryStore, StoreError};
