//! Output normalization
//!
//! Turns raw two-head model output into an [`AnalysisReport`]: the
//! primary label is the arg-max of the class head under softmax, and
//! condition findings are sigmoid-squashed then thresholded. A signal
//! below the threshold is dropped rather than reported.

use crate::device::Device;
use crate::engine::RawPrediction;
use crate::error::{ModelError, ModelResult};
use crate::result::{AnalysisReport, Finding};
use std::time::Duration;

pub(crate) fn softmax(xs: &[f32]) -> Vec<f32> {
    // Subtract the max for numerical stability
    let max = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = xs.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

pub(crate) fn argmax(xs: &[f32]) -> Option<usize> {
    xs.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Normalize raw head outputs into an immutable report.
///
/// Fails with `Inference` when the class head does not line up with the
/// configured labels: a model/config mismatch, not a caller error.
pub(crate) fn normalize(
    raw: RawPrediction,
    labels: &[String],
    confidence_threshold: f32,
    device_used: Device,
    elapsed: Duration,
) -> ModelResult<AnalysisReport> {
    if raw.class_scores.len() != labels.len() {
        return Err(ModelError::Inference(format!(
            "class head produced {} scores for {} labels",
            raw.class_scores.len(),
            labels.len()
        )));
    }

    let probabilities = softmax(&raw.class_scores);
    let top = argmax(&probabilities)
        .ok_or_else(|| ModelError::Inference("class head produced no scores".into()))?;

    let findings: Vec<Finding> = raw
        .finding_scores
        .into_iter()
        .filter_map(|f| {
            let confidence = sigmoid(f.score);
            (confidence >= confidence_threshold).then(|| Finding {
                id: f.id,
                severity: f.severity,
                confidence,
            })
        })
        .collect();

    Ok(AnalysisReport {
        primary_label: labels[top].clone(),
        confidence: probabilities[top],
        findings,
        device_used,
        duration_ms: elapsed.as_millis() as u64,
    })
}
