//! Analysis result types
//!
//! These are the records the serving layer caches and returns, so every
//! type here is immutable once produced and serde round-trippable.

use crate::device::Device;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Severity of a secondary finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Mild => write!(f, "mild"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Severe => write!(f, "severe"),
        }
    }
}

/// One secondary finding from the condition head (e.g. dryness, split ends)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable identifier of the condition
    pub id: String,
    pub severity: Severity,
    /// Confidence in [0, 1]; always at or above the configured threshold,
    /// weaker signals are dropped before the report is assembled
    pub confidence: f32,
}

/// The complete result of one analysis pass. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Predicted class from the primary head
    pub primary_label: String,
    /// Softmax probability of the primary label
    pub confidence: f32,
    /// Secondary findings that cleared the confidence threshold
    pub findings: Vec<Finding>,
    /// Device the forward pass actually ran on
    pub device_used: Device,
    /// Wall-clock duration of the forward pass in milliseconds
    pub duration_ms: u64,
}

/// Diagnostic snapshot of a model handle. Side-effect free to produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Configured artifact path
    pub path: PathBuf,
    /// Whether the artifact currently exists on disk
    pub exists: bool,
    /// Whether the model is resident in memory
    pub loaded: bool,
    /// Device the weights live on, when loaded
    pub device: Option<Device>,
    /// Artifact size in bytes (0 when the file is absent)
    pub artifact_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> AnalysisReport {
        AnalysisReport {
            primary_label: "wavy".into(),
            confidence: 0.92,
            findings: vec![Finding {
                id: "dryness".into(),
                severity: Severity::Moderate,
                confidence: 0.71,
            }],
            device_used: Device::Cpu,
            duration_ms: 38,
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Severe > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Mild);
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Mild.to_string(), "mild");
        assert_eq!(Severity::Severe.to_string(), "severe");
    }

    #[test]
    fn test_report_serde_roundtrip() {
        let report = sample_report();
        let json = serde_json::to_string(&report).expect("serialize");
        let back: AnalysisReport = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, report);
    }

    #[test]
    fn test_report_json_field_names() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(json["primary_label"], "wavy");
        assert_eq!(json["device_used"], "cpu");
        assert_eq!(json["findings"][0]["severity"], "moderate");
    }

    #[test]
    fn test_model_info_serde_roundtrip() {
        let info = ModelInfo {
            path: PathBuf::from("/models/hair.bin"),
            exists: true,
            loaded: false,
            device: None,
            artifact_bytes: 1024,
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: ModelInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.path, info.path);
        assert_eq!(back.loaded, false);
    }
}
