//! End-to-end job flow against a stub compute engine.
//!
//! Exercises the real registry/executor/relay/store path: fast submission,
//! legal state transitions, monotonic progress, idempotent terminal reads,
//! history commit, and the failure path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use uuid::Uuid;

use atelier::engine::{ComputeEngine, RenderOutput};
use atelier::error::EngineError;
use atelier::job::{Job, JobSpec, JobStatus, TaskRegistry};
use atelier::store::{HistoryStore, RetentionPolicy};

/// Maximum time any poll loop waits before the test is considered hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Stub engine: emits stepped progress, sleeps a little to make the work
/// observably asynchronous, then succeeds or fails on demand.
struct StubEngine {
    step_delay: Duration,
    fail_with: Option<String>,
}

impl StubEngine {
    fn ok(step_delay: Duration) -> Self {
        Self {
            step_delay,
            fail_with: None,
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            step_delay: Duration::from_millis(5),
            fail_with: Some(message.to_string()),
        }
    }
}

impl ComputeEngine for StubEngine {
    fn render(
        &self,
        spec: &JobSpec,
        on_progress: &(dyn Fn(&str, u8) + Sync),
    ) -> Result<RenderOutput, EngineError> {
        on_progress("Initializing...", 0);
        for step in 1..=4u8 {
            std::thread::sleep(self.step_delay);
            on_progress(&format!("Rendering step {step}/4"), step * 25);
        }
        if let Some(ref message) = self.fail_with {
            return Err(EngineError::Render(message.clone()));
        }
        Ok(RenderOutput {
            bytes: b"\x89PNG stub".to_vec(),
            width: spec.width,
            height: spec.height,
            seed: spec.seed.unwrap_or(7),
            elapsed_ms: 5,
        })
    }
}

fn setup(engine: impl ComputeEngine + 'static) -> (TaskRegistry, HistoryStore, TempDir) {
    let tmp = TempDir::new().unwrap();
    let store = HistoryStore::open(
        tmp.path().join("history.json"),
        tmp.path().join("images"),
        RetentionPolicy::new(500, 30),
    )
    .unwrap();
    let registry = TaskRegistry::new(Arc::new(engine), store.clone());
    (registry, store, tmp)
}

fn spec() -> JobSpec {
    JobSpec {
        prompt: "a lighthouse at dusk".to_string(),
        width: 512,
        height: 512,
        steps: 4,
        use_gpu: false,
        seed: Some(42),
        ..JobSpec::default()
    }
}

/// Poll until the job reaches a terminal state, recording every snapshot.
async fn poll_to_terminal(registry: &TaskRegistry, id: Uuid) -> Vec<Job> {
    let deadline = Instant::now() + TEST_TIMEOUT;
    let mut snapshots = Vec::new();
    loop {
        let job = registry.query(id).await.expect("job should exist");
        let terminal = job.status.is_terminal();
        snapshots.push(job);
        if terminal {
            return snapshots;
        }
        assert!(Instant::now() < deadline, "job never reached terminal state");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn submit_returns_before_work_finishes() {
    let (registry, _store, _tmp) = setup(StubEngine::ok(Duration::from_millis(100)));

    let started = Instant::now();
    let id = registry.submit(spec()).await;
    // The render takes ~400ms; submission must not wait for it.
    assert!(started.elapsed() < Duration::from_millis(100));

    let job = registry.query(id).await.unwrap();
    assert!(matches!(
        job.status,
        JobStatus::Pending | JobStatus::Processing
    ));

    poll_to_terminal(&registry, id).await;
}

#[tokio::test]
async fn job_completes_with_result_and_history_entry() {
    let (registry, store, _tmp) = setup(StubEngine::ok(Duration::from_millis(10)));
    let id = registry.submit(spec()).await;

    let snapshots = poll_to_terminal(&registry, id).await;
    let last = snapshots.last().unwrap();
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.progress, 100);
    assert_eq!(last.current_step, last.total_steps);
    assert!(last.error.is_none());

    let result = last.result.as_ref().expect("completed job carries result");
    assert_eq!(result.prompt, "a lighthouse at dusk");
    assert_eq!(result.seed, 42);

    // The committed record is first (newest) in history and its artifact
    // file exists.
    let page = store.list(1, 20).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.images[0].id, result.id);
    assert!(store.artifact_path(&page.images[0]).exists());
}

#[tokio::test]
async fn status_transitions_are_legal_and_progress_monotonic() {
    let (registry, _store, _tmp) = setup(StubEngine::ok(Duration::from_millis(20)));
    let id = registry.submit(spec()).await;

    let snapshots = poll_to_terminal(&registry, id).await;
    for pair in snapshots.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.status == b.status || a.status.can_transition_to(b.status),
            "illegal transition {} -> {}",
            a.status,
            b.status
        );
        if a.status == JobStatus::Processing && b.status == JobStatus::Processing {
            assert!(b.progress >= a.progress, "progress went backwards");
        }
    }
}

#[tokio::test]
async fn terminal_reads_are_idempotent() {
    let (registry, _store, _tmp) = setup(StubEngine::ok(Duration::from_millis(5)));
    let id = registry.submit(spec()).await;
    poll_to_terminal(&registry, id).await;

    let first = registry.query(id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = registry.query(id).await.unwrap();

    assert_eq!(first.status, second.status);
    assert_eq!(first.progress, second.progress);
    assert_eq!(first.message, second.message);
    assert_eq!(
        first.result.as_ref().map(|r| r.id),
        second.result.as_ref().map(|r| r.id)
    );
    assert_eq!(first.error, second.error);
}

#[tokio::test]
async fn failed_job_carries_error_and_leaves_store_untouched() {
    let (registry, store, _tmp) = setup(StubEngine::failing("out of memory"));
    let id = registry.submit(spec()).await;

    let snapshots = poll_to_terminal(&registry, id).await;
    let last = snapshots.last().unwrap();
    assert_eq!(last.status, JobStatus::Failed);
    assert_eq!(last.error.as_deref(), Some("out of memory"));
    assert!(last.result.is_none());
    // Progress relayed before the failure is retained, not rolled back.
    assert_eq!(last.progress, 100);

    assert_eq!(store.list(1, 20).await.unwrap().total, 0);
}

#[tokio::test]
async fn unknown_job_id_is_not_found() {
    let (registry, _store, _tmp) = setup(StubEngine::ok(Duration::from_millis(1)));
    assert!(registry.query(Uuid::new_v4()).await.is_none());
}

#[tokio::test]
async fn concurrent_jobs_do_not_interfere() {
    let (registry, store, _tmp) = setup(StubEngine::ok(Duration::from_millis(10)));

    let mut ids = Vec::new();
    for i in 0..4u64 {
        let mut s = spec();
        s.seed = Some(i);
        ids.push(registry.submit(s).await);
    }
    assert_eq!(registry.job_count().await, 4);

    let outcomes =
        futures::future::join_all(ids.iter().map(|id| poll_to_terminal(&registry, *id))).await;
    for snapshots in outcomes {
        assert_eq!(snapshots.last().unwrap().status, JobStatus::Completed);
    }
    assert_eq!(store.list(1, 20).await.unwrap().total, 4);
}
