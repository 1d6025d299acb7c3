//! Model handle: lifecycle and prediction entry point
//!
//! One handle exists per process and exclusively owns the loaded weights.
//! The lifecycle is an explicit state machine
//! (Unloaded → Loading → Loaded → Unloading) guarded by a single engine
//! mutex: loading is single-flight (a second caller arriving during
//! Loading waits for the same load instead of triggering another), and
//! predictions against the loaded engine are serialized. Coarse
//! serialization is the correctness baseline here; concurrent forward
//! passes are an engine-level optimization.
//!
//! Out-of-memory recovery: the first OOM reported by the engine triggers
//! exactly one reload-and-retry on CPU, switching the handle's device
//! for the remainder of the process. A second OOM is surfaced as an
//! inference failure.

use crate::config::ModelConfig;
use crate::device::Device;
use crate::engine::{ArtifactEngine, InferenceEngine};
use crate::error::{ModelError, ModelResult};
use crate::input::AnalysisInput;
use crate::postprocess::normalize;
use crate::result::{AnalysisReport, ModelInfo};
use std::sync::RwLock;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Lifecycle state of a [`ModelHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// No weights resident; the next predict will load lazily
    Unloaded,
    /// A load is in flight; concurrent callers wait on it
    Loading,
    /// Weights resident on `loaded_device`
    Loaded,
    /// Weights being released
    Unloading,
}

#[derive(Debug, Clone, Copy)]
struct Status {
    state: HandleState,
    device: Option<Device>,
}

/// Owns a single loaded model instance and its device placement.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct ModelHandle {
    config: ModelConfig,
    status: RwLock<Status>,
    engine: Mutex<Box<dyn InferenceEngine>>,
}

impl ModelHandle {
    /// Create a handle in the Unloaded state with an explicit engine.
    pub fn new(config: ModelConfig, engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            config,
            status: RwLock::new(Status {
                state: HandleState::Unloaded,
                device: None,
            }),
            engine: Mutex::new(engine),
        }
    }

    /// Create a handle backed by the built-in [`ArtifactEngine`].
    pub fn with_default_engine(config: ModelConfig) -> Self {
        let engine = ArtifactEngine::new(config.labels.len());
        Self::new(config, Box::new(engine))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn state(&self) -> HandleState {
        self.status_snapshot().state
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == HandleState::Loaded
    }

    /// Device the weights currently live on, if loaded
    pub fn loaded_device(&self) -> Option<Device> {
        self.status_snapshot().device
    }

    /// Diagnostic snapshot; side-effect free.
    pub fn info(&self) -> ModelInfo {
        let status = self.status_snapshot();
        let metadata = std::fs::metadata(&self.config.model_path).ok();
        ModelInfo {
            path: self.config.model_path.clone(),
            exists: metadata.is_some(),
            loaded: status.state == HandleState::Loaded,
            device: status.device,
            artifact_bytes: metadata.map(|m| m.len()).unwrap_or(0),
        }
    }

    /// True when the model is resident and its artifact is still accessible
    pub fn health_check(&self) -> bool {
        self.is_loaded() && self.config.model_path.exists()
    }

    /// Load the model now instead of paying the cost on the first predict.
    pub async fn warm_up(&self) -> ModelResult<()> {
        self.load().await
    }

    /// Materialize the model on the detected device.
    ///
    /// Idempotent: returns immediately when already loaded. Fails with
    /// `ModelNotFound` (fatal) when the artifact path does not exist,
    /// before any state transition happens.
    pub async fn load(&self) -> ModelResult<()> {
        let mut engine = self.engine.lock().await;
        self.load_locked(&mut engine).await.map(|_| ())
    }

    /// Run one analysis pass, lazily loading the model first if needed.
    ///
    /// The forward pass is bounded by the configured wall-clock budget.
    /// The first out-of-memory failure triggers a single reload-and-retry
    /// on CPU; any further OOM surfaces as `Inference`.
    pub async fn predict(&self, input: &AnalysisInput) -> ModelResult<AnalysisReport> {
        input.check_dims(self.config.input_height, self.config.input_width)?;

        let mut engine = self.engine.lock().await;
        let mut device = match self.status_snapshot() {
            Status {
                state: HandleState::Loaded,
                device: Some(d),
            } => d,
            _ => self.load_locked(&mut engine).await?,
        };

        let started = Instant::now();
        let budget = self.config.max_inference_time();

        let raw = match tokio::time::timeout(budget, engine.forward(input)).await {
            Err(_) => {
                return Err(ModelError::Timeout {
                    budget_ms: self.config.max_inference_ms,
                });
            }
            Ok(Ok(raw)) => raw,
            Ok(Err(ModelError::OutOfMemory(cause))) => {
                if device == Device::Cpu {
                    // Already on the least constrained device; nothing
                    // left to retry on.
                    return Err(ModelError::Inference(format!(
                        "out of memory on cpu: {cause}"
                    )));
                }

                warn!(
                    model = %self.config.model_path.display(),
                    from = %device,
                    %cause,
                    "device out of memory, retrying once on cpu"
                );

                self.reload_on_cpu(&mut engine).await?;
                device = Device::Cpu;

                match tokio::time::timeout(budget, engine.forward(input)).await {
                    Err(_) => {
                        return Err(ModelError::Timeout {
                            budget_ms: self.config.max_inference_ms,
                        });
                    }
                    Ok(Ok(raw)) => raw,
                    Ok(Err(e)) => {
                        return Err(ModelError::Inference(format!("cpu retry failed: {e}")));
                    }
                }
            }
            Ok(Err(e)) => {
                return Err(match e {
                    ModelError::Validation(v) => ModelError::Validation(v),
                    other => ModelError::Inference(other.to_string()),
                });
            }
        };

        normalize(
            raw,
            &self.config.labels,
            self.config.confidence_threshold,
            device,
            started.elapsed(),
        )
    }

    /// Release device memory and drop the weights. No-op when already
    /// Unloaded.
    pub async fn unload(&self) {
        let mut engine = self.engine.lock().await;
        let status = self.status_snapshot();
        if status.state == HandleState::Unloaded {
            return;
        }

        self.set_status(HandleState::Unloading, status.device);
        engine.unload().await;
        self.set_status(HandleState::Unloaded, None);

        info!(model = %self.config.model_path.display(), "model unloaded");
    }

    /// Perform the load with the engine lock already held.
    ///
    /// The caller holding the lock is what makes loading single-flight:
    /// a concurrent caller blocks on the mutex and, once inside, sees
    /// state Loaded and skips straight to its forward pass.
    async fn load_locked(
        &self,
        engine: &mut Box<dyn InferenceEngine>,
    ) -> ModelResult<Device> {
        if let Status {
            state: HandleState::Loaded,
            device: Some(d),
        } = self.status_snapshot()
        {
            return Ok(d);
        }

        if !self.config.model_path.exists() {
            return Err(ModelError::ModelNotFound {
                path: self.config.model_path.display().to_string(),
            });
        }

        let device = Device::detect(self.config.device_preference);
        self.set_status(HandleState::Loading, None);

        info!(
            model = %self.config.model_path.display(),
            %device,
            version = %self.config.model_version,
            "loading model"
        );

        match engine.load(&self.config.model_path, device).await {
            Ok(()) => {
                self.set_status(HandleState::Loaded, Some(device));
                Ok(device)
            }
            Err(e) => {
                self.set_status(HandleState::Unloaded, None);
                Err(match e {
                    ModelError::Device(d) => ModelError::Device(d),
                    other => ModelError::ModelLoad {
                        device,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    /// Drop the current placement and reload on CPU, permanently.
    async fn reload_on_cpu(&self, engine: &mut Box<dyn InferenceEngine>) -> ModelResult<()> {
        engine.unload().await;
        self.set_status(HandleState::Loading, None);

        match engine.load(&self.config.model_path, Device::Cpu).await {
            Ok(()) => {
                self.set_status(HandleState::Loaded, Some(Device::Cpu));
                Ok(())
            }
            Err(e) => {
                self.set_status(HandleState::Unloaded, None);
                Err(ModelError::ModelLoad {
                    device: Device::Cpu,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn status_snapshot(&self) -> Status {
        match self.status.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_status(&self, state: HandleState, device: Option<Device>) {
        let mut guard = match self.status.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Status { state, device };
    }
}

// ============================================================================
// Tests
// ============================================================================
