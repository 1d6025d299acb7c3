//! External style-provider contract
//!
//! Wire-level clients (HTTP, polling details, auth) live outside this
//! crate; the orchestrator only depends on the abstract submit/poll
//! shape and on [`run_job`], which drives repeated polls under one
//! overall deadline so no provider can hang a request.

use crate::fallback::RequestSignals;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use tress_inference::AnalysisReport;

/// Errors from the external provider path
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("submit failed: {0}")]
    Submit(String),
    #[error("poll failed: {0}")]
    Poll(String),
    #[error("provider job failed: {0}")]
    JobFailed(String),
    #[error("provider did not finish within {budget_ms}ms")]
    TimedOut { budget_ms: u64 },
}

/// What a submitted job looks like from the outside
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending,
    Done(AnalysisReport),
    Failed(String),
}

/// The request handed to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Fingerprint of the input the job is about
    pub input_digest: String,
    /// Signals the provider may act on (named style, etc.)
    pub signals: RequestSignals,
}

/// Abstract external provider: submit a job, poll it to completion.
#[async_trait]
pub trait StyleProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, request: &ProviderRequest) -> Result<String, ProviderError>;

    async fn poll(&self, job_id: &str) -> Result<JobStatus, ProviderError>;
}

/// Submit a job and poll until it completes, fails, or the overall
/// deadline passes. The deadline covers submit and every poll together.
pub async fn run_job(
    provider: &dyn StyleProvider,
    request: &ProviderRequest,
    poll_interval: Duration,
    overall_timeout: Duration,
) -> Result<AnalysisReport, ProviderError> {
    let budget_ms = overall_timeout.as_millis() as u64;

    let job = async {
        let job_id = provider.submit(request).await?;
        debug!(provider = provider.name(), %job_id, "provider job submitted");

        loop {
            match provider.poll(&job_id).await? {
                JobStatus::Done(report) => {
                    debug!(provider = provider.name(), %job_id, "provider job done");
                    return Ok(report);
                }
                JobStatus::Failed(reason) => return Err(ProviderError::JobFailed(reason)),
                JobStatus::Pending => tokio::time::sleep(poll_interval).await,
            }
        }
    };

    tokio::time::timeout(overall_timeout, job)
        .await
        .unwrap_or(Err(ProviderError::TimedOut { budget_ms }))
}

// ============================================================================
// Tests
// ============================================================================
