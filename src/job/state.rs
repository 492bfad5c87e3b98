//! Job state machine and records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::ResultRecord;

/// Status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is registered and waiting for its worker to start.
    Pending,
    /// The worker is running the generation.
    Processing,
    /// Generation finished and the result is committed to history.
    Completed,
    /// Generation raised an error.
    Failed,
}

impl JobStatus {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Immutable parameters for one generation. Consumed at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Number of inference steps.
    pub steps: u32,
    pub use_gpu: bool,
    pub gpu_id: u32,
    /// Seed for reproducibility; drawn by the engine when absent.
    pub seed: Option<u64>,
    pub batch_size: u32,
    pub guidance_scale: f32,
}

impl Default for JobSpec {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: None,
            width: 1024,
            height: 1024,
            steps: 9,
            use_gpu: true,
            gpu_id: 0,
            seed: None,
            batch_size: 1,
            guidance_scale: 0.0,
        }
    }
}

/// Mutable record of one tracked job. Owned exclusively by the
/// [`TaskRegistry`](crate::job::TaskRegistry); callers only ever see
/// snapshot copies.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    /// Progress percentage, 0–100, non-decreasing while processing.
    pub progress: u8,
    pub total_steps: u32,
    pub current_step: u32,
    /// Latest human-readable status line. Overwritten, not appended.
    pub message: String,
    /// Present iff the job completed.
    pub result: Option<ResultRecord>,
    /// Present iff the job failed.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a fresh pending job for a spec.
    pub fn new(id: Uuid, spec: &JobSpec) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            total_steps: spec.steps,
            current_step: 0,
            message: "Task created, waiting to start...".to_string(),
            result: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Merge the provided fields of `update` into this record.
    ///
    /// Returns `false` (unmerged) when the job is already terminal and the
    /// update does not itself carry a terminal transition — late progress
    /// events are dropped, not errors.
    pub fn apply(&mut self, update: JobUpdate) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if let Some(status) = update.status {
            if !self.status.can_transition_to(status) {
                return false;
            }
            self.status = status;
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(percent) = update.progress {
            // Clamp so pollers always observe non-decreasing progress.
            self.progress = self.progress.max(percent.min(100));
            self.current_step =
                (u64::from(self.progress) * u64::from(self.total_steps) / 100) as u32;
        }
        if let Some(record) = update.result {
            self.result = Some(record);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        true
    }
}

/// Partial update merged into a [`Job`] by the registry. Only fields that
/// are `Some` are applied.
#[derive(Debug, Default, Clone)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub message: Option<String>,
    pub progress: Option<u8>,
    pub result: Option<ResultRecord>,
    pub error: Option<String>,
}

impl JobUpdate {
    /// Transition to processing with a status line.
    pub fn processing(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A progress event from the relay.
    pub fn progress(message: impl Into<String>, percent: u8) -> Self {
        Self {
            message: Some(message.into()),
            progress: Some(percent),
            ..Self::default()
        }
    }

    /// Terminal completion with the committed result.
    pub fn completed(record: ResultRecord) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            message: Some("Image generation completed".to_string()),
            progress: Some(100),
            result: Some(record),
            ..Self::default()
        }
    }

    /// Terminal failure with the captured error message.
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: Some(JobStatus::Failed),
            message: Some(format!("Error: {error}")),
            error: Some(error),
            ..Self::default()
        }
    }
}
