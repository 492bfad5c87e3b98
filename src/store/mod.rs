//! Durable history of completed results and their artifact files.

pub mod history;
pub mod retention;

pub use history::{CleanupReport, HistoryPage, HistoryStore};
pub use retention::RetentionPolicy;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted metadata for one completed artifact.
///
/// Lives in its own id namespace, independent of job ids, and may outlive
/// the job record that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: Uuid,
    /// Artifact file name inside the images directory.
    pub filename: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub use_gpu: bool,
    pub seed: u64,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Render wall-clock time in milliseconds, when measured.
    pub elapsed_ms: Option<u64>,
}
