//! The compute-runtime seam
//!
//! [`InferenceEngine`] is the boundary between the handle's lifecycle
//! logic and whatever actually executes the forward pass. The handle
//! owns exactly one engine and drives it through load/forward/unload;
//! engines report failures through [`ModelError`] so the handle can
//! tell an out-of-memory condition apart from an ordinary failure.
//!
//! [`ArtifactEngine`] is the built-in engine: it materializes the
//! artifact file and produces deterministic raw outputs, which keeps the
//! full pipeline executable on any machine. Real compute runtimes slot
//! in behind the same trait.

use crate::device::Device;
use crate::error::{ModelError, ModelResult};
use crate::input::AnalysisInput;
use crate::result::Severity;
use async_trait::async_trait;
use std::path::Path;

/// Raw score for one condition, before sigmoid and thresholding
#[derive(Debug, Clone, PartialEq)]
pub struct RawFinding {
    pub id: String,
    pub severity: Severity,
    /// Unbounded logit; postprocessing maps it into [0, 1]
    pub score: f32,
}

/// Untreated model output: one logit vector per head
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    /// Primary head logits, one per class label
    pub class_scores: Vec<f32>,
    /// Condition head logits
    pub finding_scores: Vec<RawFinding>,
}

/// A compute runtime that can hold one model resident and run forward
/// passes against it.
///
/// Implementations run in inference mode only, with no gradient tracking.
/// `forward` must be callable concurrently with itself if the runtime
/// supports it; callers that cannot verify this serialize access.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Materialize the model from `artifact` onto `device`.
    ///
    /// # Errors
    /// - `ModelLoad`: the artifact is unreadable or device allocation failed
    /// - `OutOfMemory`: the device cannot hold the weights
    async fn load(&mut self, artifact: &Path, device: Device) -> ModelResult<()>;

    /// Run one forward pass. Only called between a successful `load`
    /// and the next `unload`.
    async fn forward(&self, input: &AnalysisInput) -> ModelResult<RawPrediction>;

    /// Release the weights and any device memory. Must be safe to call
    /// when nothing is loaded.
    async fn unload(&mut self);

    /// Estimated resident memory in bytes, 0 when unloaded
    fn memory_usage_bytes(&self) -> u64 {
        0
    }
}

// ============================================================================
// Built-in artifact engine
// ============================================================================

/// Condition catalog the built-in engine scores on every pass
const CONDITIONS: &[(&str, Severity)] = &[
    ("dryness", Severity::Moderate),
    ("split_ends", Severity::Mild),
    ("frizz", Severity::Mild),
    ("thinning", Severity::Severe),
    ("dandruff", Severity::Moderate),
];

/// Deterministic engine backed only by the artifact file.
///
/// Scores are derived from a digest of the input bytes, so identical
/// frames always produce identical predictions, which the caching layer
/// above relies on.
pub struct ArtifactEngine {
    num_classes: usize,
    artifact_bytes: u64,
    loaded: bool,
}

impl ArtifactEngine {
    /// `num_classes` must match the label count of the configured model.
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            artifact_bytes: 0,
            loaded: false,
        }
    }

    /// FNV-1a over the input bytes; cheap and stable across platforms
    fn seed(bytes: &[u8]) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for b in bytes {
            hash ^= u64::from(*b);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }
}

#[async_trait]
impl InferenceEngine for ArtifactEngine {
    async fn load(&mut self, artifact: &Path, device: Device) -> ModelResult<()> {
        if device == Device::Gpu && !crate::device::accelerator_present() {
            return Err(ModelError::Device(
                "gpu placement requested but no accelerator is present".into(),
            ));
        }

        let metadata = std::fs::metadata(artifact).map_err(|e| ModelError::ModelLoad {
            device,
            reason: format!("cannot read artifact {}: {e}", artifact.display()),
        })?;

        self.artifact_bytes = metadata.len();
        self.loaded = true;

        tracing::info!(
            artifact = %artifact.display(),
            device = %device,
            bytes = self.artifact_bytes,
            "artifact engine loaded"
        );
        Ok(())
    }

    async fn forward(&self, input: &AnalysisInput) -> ModelResult<RawPrediction> {
        if !self.loaded {
            return Err(ModelError::Inference("engine has no model loaded".into()));
        }

        let seed = Self::seed(&input.to_bytes());

        let class_scores: Vec<f32> = (0..self.num_classes)
            .map(|i| {
                let v = seed.rotate_left((i as u32) * 7) % 1000;
                v as f32 / 100.0
            })
            .collect();

        let finding_scores = CONDITIONS
            .iter()
            .enumerate()
            .map(|(i, (id, severity))| {
                let v = seed.rotate_right((i as u32) * 11 + 3) % 1000;
                RawFinding {
                    id: (*id).to_string(),
                    severity: *severity,
                    // Centered so roughly half the conditions clear a
                    // mid-range threshold after sigmoid
                    score: (v as f32 / 100.0) - 5.0,
                }
            })
            .collect();

        Ok(RawPrediction {
            class_scores,
            finding_scores,
        })
    }

    async fn unload(&mut self) {
        self.loaded = false;
        self.artifact_bytes = 0;
    }

    fn memory_usage_bytes(&self) -> u64 {
        if self.loaded { self.artifact_bytes } else { 0 }
    }
}

// ============================================================================
// Tests
// ============================================================================
