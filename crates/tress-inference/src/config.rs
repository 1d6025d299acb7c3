//! Configuration for the analysis model runtime

use crate::device::DevicePreference;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default class labels for the hair-type head
fn default_labels() -> Vec<String> {
    ["straight", "wavy", "curly", "coily"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Configuration for a [`ModelHandle`](crate::handle::ModelHandle)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the serialized model artifact
    pub model_path: PathBuf,

    /// Version tag of the deployed model. Results computed by different
    /// versions are never interchangeable, so downstream caches key by it.
    pub model_version: String,

    /// Where to place the model weights. `Auto` probes for an accelerator.
    pub device_preference: DevicePreference,

    /// Minimum confidence for a secondary finding to be reported.
    /// Signals below this are dropped rather than surfaced.
    pub confidence_threshold: f32,

    /// Expected input image height in pixels
    pub input_height: usize,

    /// Expected input image width in pixels
    pub input_width: usize,

    /// Maximum wall-clock budget for a single forward pass, in
    /// milliseconds. A pass that exceeds it fails rather than hangs.
    pub max_inference_ms: u64,

    /// Class labels for the primary head, in output order
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            model_version: String::from("v1"),
            device_preference: DevicePreference::Auto,
            confidence_threshold: 0.5,
            input_height: 224,
            input_width: 224,
            max_inference_ms: 30_000,
            labels: default_labels(),
        }
    }
}

impl ModelConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            ..Default::default()
        }
    }

    /// Set the deployed model version tag
    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    /// Set the device preference
    pub fn with_device_preference(mut self, preference: DevicePreference) -> Self {
        self.device_preference = preference;
        self
    }

    /// Set the finding confidence threshold
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Result<Self, &'static str> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err("confidence_threshold must be between 0.0 and 1.0");
        }
        self.confidence_threshold = threshold;
        Ok(self)
    }

    /// Set the expected input dimensions
    pub fn with_input_dims(mut self, height: usize, width: usize) -> Result<Self, &'static str> {
        if height == 0 || width == 0 {
            return Err("input dimensions must be > 0");
        }
        self.input_height = height;
        self.input_width = width;
        Ok(self)
    }

    /// Set the forward-pass wall-clock budget in milliseconds
    pub fn with_max_inference_ms(mut self, ms: u64) -> Result<Self, &'static str> {
        if ms == 0 {
            return Err("max_inference_ms must be > 0");
        }
        self.max_inference_ms = ms;
        Ok(self)
    }

    /// Set the primary-head class labels
    pub fn with_labels(mut self, labels: Vec<String>) -> Result<Self, &'static str> {
        if labels.is_empty() {
            return Err("labels must not be empty");
        }
        if labels.iter().any(|l| l.is_empty()) {
            return Err("labels must not contain empty strings");
        }
        self.labels = labels;
        Ok(self)
    }

    /// The forward-pass budget as a [`Duration`]
    pub fn max_inference_time(&self) -> Duration {
        Duration::from_millis(self.max_inference_ms)
    }

    /// Number of f32 elements a valid input tensor must contain
    pub fn expected_input_len(&self) -> usize {
        self.input_height * self.input_width * 3
    }
}

// ============================================================================
// Tests
// ============================================================================
