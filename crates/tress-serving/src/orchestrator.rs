//! Inference orchestration
//!
//! The single entry point a request handler calls. Each request walks
//! the same pipeline: cache lookup, rate-limit check, bounded local
//! inference with lazy model loading, fallback decision, cache
//! write-through. The orchestrator owns no policy of its own: routing
//! and escalation come from [`crate::fallback`], lifecycle from the
//! model handle. It only sequences them.

use crate::cache::{ResultCache, fingerprint};
use crate::config::ServingConfig;
use crate::error::{ServingError, ServingResult};
use crate::fallback::{RequestSignals, decide_route, should_escalate};
use crate::provider::{ProviderRequest, StyleProvider, run_job};
use crate::rate_limit::RateLimiter;
use crate::store::KvStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use tress_inference::{AnalysisInput, AnalysisReport, ModelError, ModelHandle};

/// One analysis request as the serving layer sees it
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub input: AnalysisInput,
    /// Identifier the rate limiter counts against
    pub caller_id: String,
    pub signals: RequestSignals,
}

impl AnalysisRequest {
    pub fn new(input: AnalysisInput, caller_id: impl Into<String>) -> Self {
        Self {
            input,
            caller_id: caller_id.into(),
            signals: RequestSignals::default(),
        }
    }

    pub fn with_signals(mut self, signals: RequestSignals) -> Self {
        self.signals = signals;
        self
    }
}

/// Where the served report actually came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Byte-identical input was analyzed before and is still fresh
    Cache,
    /// The local model produced it
    Local,
    /// The local model produced it with low confidence; escalation was
    /// attempted but did not yield a better answer
    LocalLowConfidence,
    /// The external provider produced it
    External { provider: String },
}

/// A served analysis with provenance
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub report: AnalysisReport,
    pub source: ResultSource,
    /// Fingerprint of the input, usable as a cache/invalidation handle
    pub digest: String,
}

/// Composes the model handle, cache, rate limiter, and fallback policy
/// into one request pipeline.
pub struct InferenceOrchestrator {
    model: Arc<ModelHandle>,
    cache: ResultCache,
    limiter: RateLimiter,
    provider: Option<Arc<dyn StyleProvider>>,
    config: ServingConfig,
    inflight: Semaphore,
}

impl InferenceOrchestrator {
    /// Wire the pipeline. The cache and rate limiter share `store`; the
    /// cache namespace is tied to the handle's model version so a model
    /// upgrade never serves stale results.
    pub fn new(
        model: Arc<ModelHandle>,
        store: Arc<dyn KvStore>,
        provider: Option<Arc<dyn StyleProvider>>,
        config: ServingConfig,
    ) -> Self {
        let cache = ResultCache::new(
            store.clone(),
            model.config().model_version.clone(),
            config.cache.clone(),
        );
        let limiter = RateLimiter::new(store, config.rate_limit.clone());
        let inflight = Semaphore::new(config.max_concurrent_inferences);

        Self {
            model,
            cache,
            limiter,
            provider,
            config,
            inflight,
        }
    }

    pub fn model(&self) -> &Arc<ModelHandle> {
        &self.model
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Serve one analysis request.
    pub async fn analyze(&self, request: AnalysisRequest) -> ServingResult<AnalysisOutcome> {
        let digest = fingerprint(&request.input.to_bytes());

        // Step 1: byte-identical input already analyzed?
        if let Some(report) = self.cache.get_report(&digest).await {
            info!(%digest, caller = %request.caller_id, "served from cache");
            return Ok(AnalysisOutcome {
                report,
                source: ResultSource::Cache,
                digest,
            });
        }

        // Step 2: quota. Cache hits above never reach this point, so the
        // ceiling protects recomputation, not lookups.
        let decision = self.limiter.check(&request.caller_id).await;
        if !decision.allowed {
            return Err(ServingError::RateLimited {
                identifier: request.caller_id,
                current: decision.current,
                limit: decision.limit,
                reset_at: decision.reset_at,
            });
        }

        // Step 3: bound concurrent inference work
        let _permit = self
            .inflight
            .acquire()
            .await
            .map_err(|_| ModelError::Inference("serving is shutting down".into()))?;

        // Step 4: pick the inference path before touching the model
        let route = decide_route(&self.config.fallback, &request.signals);
        debug!(%digest, use_external = route.use_external, reason = ?route.reason, "route decided");

        if route.use_external {
            if let Some(provider) = self.available_provider() {
                let report = self.run_provider(provider, &digest, &request.signals).await?;
                self.cache.put_report(&digest, &report).await;
                return Ok(AnalysisOutcome {
                    report,
                    source: ResultSource::External {
                        provider: provider.name().to_string(),
                    },
                    digest,
                });
            }
            warn!(%digest, "external route chosen but no provider is wired, running locally");
        }

        // Step 5: local inference, lazily loading the model
        let local = self.model.predict(&request.input).await;

        // Step 6: interpret the local attempt
        match local {
            Ok(report) => {
                let escalation = should_escalate(&self.config.fallback, Ok(&report));
                if escalation.use_external {
                    if let Some(provider) = self.available_provider() {
                        debug!(%digest, confidence = report.confidence, "escalating low-confidence result");
                        match self.run_provider(provider, &digest, &request.signals).await {
                            Ok(external) => {
                                self.cache.put_report(&digest, &external).await;
                                return Ok(AnalysisOutcome {
                                    report: external,
                                    source: ResultSource::External {
                                        provider: provider.name().to_string(),
                                    },
                                    digest,
                                });
                            }
                            Err(e) => {
                                // The local result is still a success;
                                // keep it rather than failing the request.
                                warn!(%digest, error = %e, "escalation failed, keeping local result");
                                self.cache.put_report(&digest, &report).await;
                                return Ok(AnalysisOutcome {
                                    report,
                                    source: ResultSource::LocalLowConfidence,
                                    digest,
                                });
                            }
                        }
                    }
                }

                self.cache.put_report(&digest, &report).await;
                info!(%digest, label = %report.primary_label, "served locally");
                Ok(AnalysisOutcome {
                    report,
                    source: ResultSource::Local,
                    digest,
                })
            }
            Err(err) => {
                let escalation = should_escalate(&self.config.fallback, Err(&err));
                if escalation.use_external {
                    if let Some(provider) = self.available_provider() {
                        warn!(%digest, error = %err, "local attempt failed, escalating");
                        return match self.run_provider(provider, &digest, &request.signals).await {
                            Ok(external) => {
                                self.cache.put_report(&digest, &external).await;
                                Ok(AnalysisOutcome {
                                    report: external,
                                    source: ResultSource::External {
                                        provider: provider.name().to_string(),
                                    },
                                    digest,
                                })
                            }
                            Err(provider_error) => Err(ServingError::FallbackExhausted {
                                source: err,
                                provider_error: provider_error.to_string(),
                            }),
                        };
                    }
                }
                Err(ServingError::Model(err))
            }
        }
    }

    /// The provider, when the fallback path is actually usable
    fn available_provider(&self) -> Option<&Arc<dyn StyleProvider>> {
        if self.config.fallback.enabled {
            self.provider.as_ref()
        } else {
            None
        }
    }

    async fn run_provider(
        &self,
        provider: &Arc<dyn StyleProvider>,
        digest: &str,
        signals: &RequestSignals,
    ) -> Result<AnalysisReport, crate::provider::ProviderError> {
        let request = ProviderRequest {
            input_digest: digest.to_string(),
            signals: signals.clone(),
        };
        run_job(
            provider.as_ref(),
            &request,
            self.config.poll_interval(),
            self.config.poll_timeout(),
        )
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::io::Write;
    use std::path::Path;
    use tress_inference::{
        Device, DevicePreference, InferenceEngine, ModelConfig, ModelResult, RawPrediction,
    };

    /// Engine returning a fixed class head, for predictable confidence
    struct FixedEngine {
        class_scores: Vec<f32>,
    }

    #[async_trait]
    impl InferenceEngine for FixedEngine {
        async fn load(&mut self, _artifact: &Path, _device: Device) -> ModelResult<()> {
            Ok(())
        }

        async fn forward(&self, _input: &AnalysisInput) -> ModelResult<RawPrediction> {
            Ok(RawPrediction {
                class_scores: self.class_scores.clone(),
                finding_scores: vec![],
            })
        }

        async fn unload(&mut self) {}
    }

    fn artifact_file() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"weights").unwrap();
        f
    }

    fn model(path: &Path, class_scores: Vec<f32>) -> Arc<ModelHandle> {
        let config = ModelConfig::new(path)
            .with_device_preference(DevicePreference::Cpu)
            .with_labels(vec!["straight".into(), "wavy".into()])
            .unwrap()
            .with_input_dims(4, 4)
            .unwrap();
        Arc::new(ModelHandle::new(config, Box::new(FixedEngine { class_scores })))
    }

    fn input() -> AnalysisInput {
        AnalysisInput::new(vec![0.5; 4 * 4 * 3], 4, 4).unwrap()
    }

    #[tokio::test]
    async fn test_local_path_caches_and_replays() {
        let f = artifact_file();
        let orchestrator = InferenceOrchestrator::new(
            model(f.path(), vec![5.0, 0.0]),
            MemoryStore::shared(),
            None,
            ServingConfig::default(),
        );

        let first = orchestrator
            .analyze(AnalysisRequest::new(input(), "caller-1"))
            .await
            .unwrap();
        assert_eq!(first.source, ResultSource::Local);
        assert_eq!(first.report.primary_label, "straight");

        let second = orchestrator
            .analyze(AnalysisRequest::new(input(), "caller-1"))
            .await
            .unwrap();
        assert_eq!(second.source, ResultSource::Cache);
        assert_eq!(second.report, first.report);
        assert_eq!(second.digest, first.digest);
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_recomputation() {
        let f = artifact_file();
        let config = ServingConfig {
            rate_limit: crate::rate_limit::RateLimitConfig {
                max_requests: 1,
                window_secs: 60,
            },
            ..Default::default()
        };
        let orchestrator = InferenceOrchestrator::new(
            model(f.path(), vec![5.0, 0.0]),
            MemoryStore::shared(),
            None,
            config,
        );

        orchestrator
            .analyze(AnalysisRequest::new(input(), "caller-1"))
            .await
            .unwrap();

        // Different input: cache miss, quota exhausted
        let other = AnalysisInput::new(vec![0.25; 4 * 4 * 3], 4, 4).unwrap();
        let err = orchestrator
            .analyze(AnalysisRequest::new(other, "caller-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServingError::RateLimited { .. }));
        assert!(err.retry_possible());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_rate_limit() {
        let f = artifact_file();
        let config = ServingConfig {
            rate_limit: crate::rate_limit::RateLimitConfig {
                max_requests: 1,
                window_secs: 60,
            },
            ..Default::default()
        };
        let orchestrator = InferenceOrchestrator::new(
            model(f.path(), vec![5.0, 0.0]),
            MemoryStore::shared(),
            None,
            config,
        );

        orchestrator
            .analyze(AnalysisRequest::new(input(), "caller-1"))
            .await
            .unwrap();

        // Same input again: the quota is spent, but the cache answers
        let outcome = orchestrator
            .analyze(AnalysisRequest::new(input(), "caller-1"))
            .await
            .unwrap();
        assert_eq!(outcome.source, ResultSource::Cache);
    }

    #[tokio::test]
    async fn test_fatal_model_error_surfaces_without_escalation() {
        let config = ServingConfig::default();
        let orchestrator = InferenceOrchestrator::new(
            model(Path::new("/nonexistent/model.bin"), vec![5.0, 0.0]),
            MemoryStore::shared(),
            None,
            config,
        );

        let err = orchestrator
            .analyze(AnalysisRequest::new(input(), "caller-1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServingError::Model(ModelError::ModelNotFound { .. })
        ));
        assert!(!err.retry_possible());
        assert!(!err.fallback_attempted());
    }

    #[tokio::test]
    async fn test_lazy_load_happens_on_first_request() {
        let f = artifact_file();
        let handle = model(f.path(), vec![5.0, 0.0]);
        let orchestrator = InferenceOrchestrator::new(
            handle.clone(),
            MemoryStore::shared(),
            None,
            ServingConfig::default(),
        );

        assert!(!handle.is_loaded());
        orchestrator
            .analyze(AnalysisRequest::new(input(), "caller-1"))
            .await
            .unwrap();
        assert!(handle.is_loaded());
    }
}
