//! Job records tracked by the lifecycle manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── JobStatus ──────────────────────────────────────────────────────────────

/// Lifecycle status of an OCR job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Returns the wire form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Job ────────────────────────────────────────────────────────────────────

/// One tracked OCR job.
///
/// Records live inside the manager; callers only ever see clones, so a
/// returned job never changes under the caller's feet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique identifier, `job_` followed by a random UUID.
    pub id: String,
    /// Current status.
    pub status: JobStatus,
    /// Opaque locator for the uploaded document, stored verbatim and handed
    /// back to the storage layer on request.
    pub source_reference: String,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// Completion percentage, 0-100.
    pub progress: u8,
    /// Error message (set exactly when failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the job reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a fresh queued record with a generated id.
    pub(crate) fn new(source_reference: impl Into<String>) -> Self {
        Self {
            id: generate_job_id(),
            status: JobStatus::Queued,
            source_reference: source_reference.into(),
            created_at: Utc::now(),
            progress: 0,
            error: None,
            completed_at: None,
        }
    }

    /// Returns true if this job is finished (done, failed or cancelled).
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Generates an unguessable job identifier.
fn generate_job_id() -> String {
    format!("job_{}", uuid::Uuid::new_v4())
}

// ─── JobCounts ──────────────────────────────────────────────────────────────

/// Per-status totals for the tracked jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounts {
    pub queued: usize,
    pub processing: usize,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}
