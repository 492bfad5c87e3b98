//! Per-job execution: run the engine out-of-line and relay its progress.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::job::registry::TaskRegistry;
use crate::job::relay::{Polled, progress_relay};
use crate::job::state::{JobSpec, JobUpdate};
use crate::store::ResultRecord;

/// How long one relay poll waits before re-checking executor completion.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run one job to a terminal state.
///
/// The engine call runs on a blocking thread; this task drains the
/// progress relay with short bounded polls so a slow render never blocks
/// the registry, then commits the result and records the terminal
/// transition. A failing engine surfaces as the job's failed state and
/// never tears down the registry; progress already relayed stays put.
pub(crate) async fn run(registry: TaskRegistry, job_id: Uuid, spec: JobSpec) {
    tracing::info!(job = %job_id, "Worker starting");
    registry
        .apply_update(job_id, JobUpdate::processing("Initializing..."))
        .await;

    let (progress_tx, mut progress_rx) = progress_relay();
    let engine = registry.engine().clone();
    let engine_spec = spec.clone();
    let mut handle = tokio::task::spawn_blocking(move || {
        engine.render(&engine_spec, &|message, percent| {
            progress_tx.emit(message, percent);
        })
    });

    // Apply progress while waiting for the render to finish. The sender
    // lives on the blocking thread, so a closed relay means the render
    // returned; either way residual events are drained before the
    // terminal transition below.
    let rendered = loop {
        if handle.is_finished() {
            break (&mut handle).await;
        }
        match progress_rx.poll(POLL_INTERVAL).await {
            Polled::Event(event) => {
                registry
                    .apply_update(job_id, JobUpdate::progress(event.message, event.percent))
                    .await;
            }
            Polled::Idle => {}
            Polled::Closed => break (&mut handle).await,
        }
    };

    for event in progress_rx.drain() {
        registry
            .apply_update(job_id, JobUpdate::progress(event.message, event.percent))
            .await;
    }

    let output = match rendered {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::error!(job = %job_id, error = %e, "Worker failed");
            registry
                .apply_update(job_id, JobUpdate::failed(e.to_string()))
                .await;
            return;
        }
        Err(join_err) => {
            tracing::error!(job = %job_id, error = %join_err, "Worker panicked");
            registry
                .apply_update(
                    job_id,
                    JobUpdate::failed(format!("Worker panicked: {join_err}")),
                )
                .await;
            return;
        }
    };

    let created_at = Utc::now();
    let record_id = Uuid::new_v4();
    let record = ResultRecord {
        id: record_id,
        filename: format!("{}_{}.png", created_at.format("%Y%m%d_%H%M%S"), record_id),
        prompt: spec.prompt,
        negative_prompt: spec.negative_prompt,
        width: output.width,
        height: output.height,
        steps: spec.steps,
        use_gpu: spec.use_gpu,
        seed: output.seed,
        size_bytes: output.bytes.len() as u64,
        created_at,
        elapsed_ms: Some(output.elapsed_ms),
    };

    // A commit that cannot write its artifact or log must not be reported
    // as success; the job fails instead of leaving a record-less result.
    match registry.store().commit(&record, &output.bytes).await {
        Ok(()) => {
            tracing::info!(job = %job_id, result = %record.id, "Worker completed");
            registry
                .apply_update(job_id, JobUpdate::completed(record))
                .await;
        }
        Err(e) => {
            tracing::error!(job = %job_id, error = %e, "Failed to commit result");
            registry
                .apply_update(job_id, JobUpdate::failed(e.to_string()))
                .await;
        }
    }
}
