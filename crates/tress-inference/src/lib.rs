//! # tress-inference
//!
//! Runtime for the hair-analysis model: device detection, a lazily
//! loading model handle with an explicit lifecycle state machine, and
//! output normalization into immutable analysis reports.
//!
//! The handle owns the only loaded model instance in the process. It
//! loads on first use, serializes loading so concurrent callers share
//! one load, and recovers from a device out-of-memory condition with a
//! single permanent switch to CPU.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tress_inference::{AnalysisInput, ModelConfig, ModelHandle};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ModelConfig::new("/models/hair-v3.bin").with_model_version("v3");
//!     let handle = ModelHandle::with_default_engine(config);
//!
//!     let frame = AnalysisInput::new(vec![0.5; 224 * 224 * 3], 224, 224)?;
//!     let report = handle.predict(&frame).await?;
//!     println!("{} ({:.0}%)", report.primary_label, report.confidence * 100.0);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod handle;
pub mod input;
mod postprocess;
pub mod result;

pub use config::ModelConfig;
pub use device::{Device, DeviceInfo, DevicePreference};
pub use engine::{ArtifactEngine, InferenceEngine, RawFinding, RawPrediction};
pub use error::{ModelError, ModelResult};
pub use handle::{HandleState, ModelHandle};
pub use input::AnalysisInput;
pub use result::{AnalysisReport, Finding, ModelInfo, Severity};
