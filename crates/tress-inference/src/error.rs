//! Error types for the model runtime
//!
//! A tagged enum with fixed fields per variant. The fatal/recoverable
//! split drives both the handle's internal retry behavior and the
//! serving layer's escalation decisions, so it is encoded here as
//! predicates rather than re-derived at each call site.

use crate::device::Device;
use thiserror::Error;

/// Model runtime error types
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The model artifact path does not exist. Configuration problem;
    /// never retried.
    #[error("model artifact not found: {path}")]
    ModelNotFound { path: String },

    /// Materializing the model on the target device failed
    #[error("model load failed on {device}: {reason}")]
    ModelLoad { device: Device, reason: String },

    /// The caller's input is malformed; rejected immediately, never retried
    #[error("invalid input: {0}")]
    Validation(String),

    /// The requested device is unavailable on this host
    #[error("device unavailable: {0}")]
    Device(String),

    /// The compute runtime ran out of device memory
    #[error("out of device memory: {0}")]
    OutOfMemory(String),

    /// Generic computation failure during the forward pass
    #[error("inference failed: {0}")]
    Inference(String),

    /// The forward pass exceeded its wall-clock budget
    #[error("inference timed out after {budget_ms}ms")]
    Timeout { budget_ms: u64 },
}

/// Result type for model runtime operations
pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    /// Fatal errors are configuration or input problems that retrying
    /// cannot fix, and must never be silently swallowed by an
    /// escalation path.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ModelError::ModelNotFound { .. }
                | ModelError::ModelLoad { .. }
                | ModelError::Validation(_)
                | ModelError::Device(_)
        )
    }

    /// Whether the caller may reasonably retry or escalate the request
    pub fn retry_possible(&self) -> bool {
        !self.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::ModelNotFound {
            path: "/models/hair.onnx".into(),
        };
        assert_eq!(err.to_string(), "model artifact not found: /models/hair.onnx");

        let err = ModelError::ModelLoad {
            device: Device::Gpu,
            reason: "allocation failed".into(),
        };
        assert!(err.to_string().contains("gpu"));

        let err = ModelError::Timeout { budget_ms: 5000 };
        assert!(err.to_string().contains("5000ms"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ModelError::ModelNotFound { path: "x".into() }.is_fatal());
        assert!(ModelError::Validation("bad shape".into()).is_fatal());
        assert!(ModelError::Device("no gpu".into()).is_fatal());
        assert!(
            ModelError::ModelLoad {
                device: Device::Cpu,
                reason: "corrupt".into()
            }
            .is_fatal()
        );

        assert!(!ModelError::OutOfMemory("8GB needed".into()).is_fatal());
        assert!(!ModelError::Inference("nan in logits".into()).is_fatal());
        assert!(!ModelError::Timeout { budget_ms: 100 }.is_fatal());
    }

    #[test]
    fn test_retry_possible_is_inverse_of_fatal() {
        let recoverable = ModelError::Inference("transient".into());
        assert!(recoverable.retry_possible());

        let fatal = ModelError::Validation("wrong dims".into());
        assert!(!fatal.retry_possible());
    }
}
