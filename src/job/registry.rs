//! Task registry — authoritative in-memory state of every job.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::engine::ComputeEngine;
use crate::job::executor;
use crate::job::state::{Job, JobSpec, JobUpdate};
use crate::store::HistoryStore;

/// Owns the job table and drives per-job executors.
///
/// Cheap to clone; all clones share one table. Mutations go through a
/// single write lock so concurrent progress events and terminal
/// transitions can never lose updates. Job records are never evicted —
/// the table is bounded only by process lifetime.
#[derive(Clone)]
pub struct TaskRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
    engine: Arc<dyn ComputeEngine>,
    store: HistoryStore,
}

impl TaskRegistry {
    /// Create a registry backed by the given engine and history store.
    pub fn new(engine: Arc<dyn ComputeEngine>, store: HistoryStore) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            engine,
            store,
        }
    }

    /// Register a pending job for `spec` and start its executor in the
    /// background. Returns the job id immediately, without waiting for
    /// any executor progress.
    pub async fn submit(&self, spec: JobSpec) -> Uuid {
        let job_id = Uuid::new_v4();
        let job = Job::new(job_id, &spec);

        self.jobs.write().await.insert(job_id, job);
        tracing::info!(job = %job_id, prompt_len = spec.prompt.len(), "Job submitted");

        let registry = self.clone();
        tokio::spawn(async move {
            executor::run(registry, job_id, spec).await;
        });

        job_id
    }

    /// Snapshot the current state of a job.
    pub async fn query(&self, job_id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// Number of tracked jobs (any state).
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Merge a partial update into a job under the registry lock.
    ///
    /// Unknown ids are tolerated silently — an update racing a job that
    /// was never registered is not an error. Updates arriving after a
    /// terminal state are dropped and logged.
    pub(crate) async fn apply_update(&self, job_id: Uuid, update: JobUpdate) {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job_id) {
            Some(job) => {
                if !job.apply(update) {
                    tracing::debug!(job = %job_id, "Dropped update for terminal job");
                }
            }
            None => {
                tracing::debug!(job = %job_id, "Dropped update for unknown job");
            }
        }
    }

    pub(crate) fn engine(&self) -> &Arc<dyn ComputeEngine> {
        &self.engine
    }

    pub(crate) fn store(&self) -> &HistoryStore {
        &self.store
    }
}
