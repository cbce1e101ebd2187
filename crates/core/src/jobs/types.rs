//! Job entity and snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::MetricMap;

/// Lifecycle state of a job.
///
/// Transitions move forward only: `Queued → Processing → {Completed | Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// One unit of asynchronous transformation work.
///
/// Mutated only by its own pipeline task, always under the orchestrator
/// lock. `result_url`/`metrics` and `error_message` are mutually exclusive:
/// the former pair is set exactly on `Completed`, the latter exactly on
/// `Error`.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    /// Source artifact id, resolved by the artifact store.
    pub source: String,
    /// Operation id, opaque here; interpreted by the engine.
    pub operation: String,
    /// Validated params blob; never inspected by job code.
    pub params: Value,
    /// Optional reference artifact for reference-based operations.
    pub target_ref: Option<String>,
    pub status: JobStatus,
    /// In [0, 100], monotonically non-decreasing.
    pub progress: u8,
    pub result_url: Option<String>,
    pub metrics: Option<MetricMap>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, on the terminal transition.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub(crate) fn new(
        id: String,
        source: String,
        operation: String,
        params: Value,
        target_ref: Option<String>,
    ) -> Self {
        Self {
            id,
            source,
            operation,
            params,
            target_ref,
            status: JobStatus::Queued,
            progress: 0,
            result_url: None,
            metrics: None,
            error_message: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Immutable copy of the observable fields.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            result_url: self.result_url.clone(),
            metrics: self.metrics.clone(),
            error: self.error_message.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Point-in-time copy of a job, used for status replies and stream messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}
