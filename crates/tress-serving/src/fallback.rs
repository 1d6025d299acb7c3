//! Local-vs-external path decisions
//!
//! Two pure decision points, no side effects:
//!
//! - [`decide_route`] picks the inference path before the local model is
//!   touched. The routing policy is an ordered rule list evaluated
//!   first-match, so every combination of signals is enumerable in tests
//!   instead of being buried in branch logic.
//! - [`should_escalate`] runs after a local attempt and decides whether
//!   the external provider should produce (or override) the result.
//!
//! Decisions carry a reason code; reasons are logged and returned to
//! callers but never persisted.

use serde::{Deserialize, Serialize};
use tress_inference::{AnalysisReport, ModelError};

/// External-provider configuration and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Master switch for the external provider path
    pub enabled: bool,
    /// Provider endpoint, when enabled
    pub endpoint: Option<String>,
    /// Local results below this confidence are escalated
    pub min_confidence: f32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            min_confidence: 0.6,
        }
    }
}

/// Per-request signals the router reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSignals {
    /// Explicit caller override: `Some(true)` forces the external path,
    /// `Some(false)` forces local, `None` lets the rules decide
    pub force_external: Option<bool>,
    /// A named style from the provider's catalog
    pub style_id: Option<String>,
    /// Caller supplied their own reference image
    pub custom_image: bool,
}

/// Why a decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    ForcedExternal,
    ForcedLocal,
    FallbackDisabled,
    CustomImageSupplied,
    NamedStyleRequested,
    NoStyleReference,
    LocalErrorEscalation,
    LowConfidence,
    ConfidenceAcceptable,
    FatalError,
}

/// The decision itself. Derived per request, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackDecision {
    pub use_external: bool,
    pub reason: FallbackReason,
}

struct RouteRule {
    applies: fn(&FallbackConfig, &RequestSignals) -> bool,
    use_external: bool,
    reason: FallbackReason,
}

/// Pre-inference routing policy, first match wins.
///
/// Order is load-bearing: the explicit override outranks everything, a
/// disabled provider vetoes any external route, and a custom reference
/// image takes precedence over a named style.
const ROUTE_RULES: &[RouteRule] = &[
    RouteRule {
        applies: |_, s| s.force_external == Some(true),
        use_external: true,
        reason: FallbackReason::ForcedExternal,
    },
    RouteRule {
        applies: |_, s| s.force_external == Some(false),
        use_external: false,
        reason: FallbackReason::ForcedLocal,
    },
    RouteRule {
        applies: |c, _| !c.enabled,
        use_external: false,
        reason: FallbackReason::FallbackDisabled,
    },
    RouteRule {
        applies: |_, s| s.custom_image,
        use_external: false,
        reason: FallbackReason::CustomImageSupplied,
    },
    RouteRule {
        applies: |_, s| s.style_id.is_some(),
        use_external: true,
        reason: FallbackReason::NamedStyleRequested,
    },
];

/// Choose the inference path before the local model runs.
pub fn decide_route(config: &FallbackConfig, signals: &RequestSignals) -> FallbackDecision {
    for rule in ROUTE_RULES {
        if (rule.applies)(config, signals) {
            return FallbackDecision {
                use_external: rule.use_external,
                reason: rule.reason,
            };
        }
    }
    FallbackDecision {
        use_external: false,
        reason: FallbackReason::NoStyleReference,
    }
}

/// Decide, after a local attempt, whether to escalate to the external
/// provider.
///
/// Any non-fatal local error escalates unconditionally. A successful
/// result escalates only when its confidence falls below the configured
/// minimum. Fatal errors are never silently escalated; the caller must
/// see them.
pub fn should_escalate(
    config: &FallbackConfig,
    outcome: Result<&AnalysisReport, &ModelError>,
) -> FallbackDecision {
    match outcome {
        Err(error) if error.is_fatal() => FallbackDecision {
            use_external: false,
            reason: FallbackReason::FatalError,
        },
        Err(_) => FallbackDecision {
            use_external: true,
            reason: FallbackReason::LocalErrorEscalation,
        },
        Ok(report) if report.confidence < config.min_confidence => FallbackDecision {
            use_external: true,
            reason: FallbackReason::LowConfidence,
        },
        Ok(_) => FallbackDecision {
            use_external: false,
            reason: FallbackReason::ConfidenceAcceptable,
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
