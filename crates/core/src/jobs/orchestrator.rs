//! Job orchestrator implementation.
//!
//! One mutex guards both the job table and the subscriber registry. Every
//! transition follows the same two-phase shape: mutate the job and copy the
//! subscriber set under the lock, then push the resulting snapshot into each
//! subscriber channel after the lock is released. Per-channel FIFO order is
//! what gives subscribers a gap-free, ordered view of a job's lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::artifacts::{ArtifactError, ArtifactStore};
use crate::engine::{EngineError, ImageEngine, MetricMap};

use super::types::{Job, JobSnapshot, JobStatus};

/// Progress checkpoint once a job's inputs are accepted for processing.
const PROGRESS_ACCEPTED: u8 = 20;
/// Progress at any terminal state.
const PROGRESS_DONE: u8 = 100;

/// Identifies one subscriber channel on one job.
pub type SubscriberId = u64;

/// Error type for orchestrator operations.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// No job with this id.
    #[error("Job not found: {0}")]
    NotFound(String),
}

/// Failures inside the pipeline. Never surfaced synchronously; their display
/// strings become the job's `error` field.
#[derive(Debug, thiserror::Error)]
enum PipelineFailure {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] ArtifactError),
}

/// A live subscription to one job's snapshot stream.
///
/// The receiver yields the job's current snapshot first, then one snapshot
/// per subsequent transition. Dropping the receiver (or unsubscribing) ends
/// delivery; the channel is unbounded, so a slow consumer never blocks the
/// pipeline.
pub struct JobSubscription {
    pub id: SubscriberId,
    pub receiver: mpsc::UnboundedReceiver<JobSnapshot>,
}

/// Mutable state behind the orchestrator lock.
#[derive(Default)]
struct Registry {
    jobs: HashMap<String, Job>,
    subscribers: HashMap<String, Vec<(SubscriberId, mpsc::UnboundedSender<JobSnapshot>)>>,
    next_subscriber_id: SubscriberId,
}

/// Field changes applied in one locked transition.
#[derive(Default)]
struct JobUpdate {
    status: Option<JobStatus>,
    progress: Option<u8>,
    result_url: Option<String>,
    metrics: Option<MetricMap>,
    error_message: Option<String>,
}

/// The job orchestrator.
///
/// Constructed once at process start and injected into request handlers;
/// jobs live for the process lifetime.
pub struct JobOrchestrator {
    engine: Arc<dyn ImageEngine>,
    store: Arc<dyn ArtifactStore>,
    registry: Arc<Mutex<Registry>>,
}

impl JobOrchestrator {
    pub fn new(engine: Arc<dyn ImageEngine>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            engine,
            store,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Submits a new job and starts its pipeline.
    ///
    /// Returns as soon as the job is registered; downstream failures are
    /// only ever observable through [`Self::status`] or a subscription.
    pub async fn submit(
        &self,
        source: String,
        operation: String,
        params: Value,
        target_ref: Option<String>,
    ) -> JobSnapshot {
        let id = Uuid::new_v4().simple().to_string();
        let job = Job::new(id.clone(), source, operation, params, target_ref);
        let snapshot = job.snapshot();

        {
            let mut registry = self.registry.lock().await;
            registry.jobs.insert(id.clone(), job);
        }

        debug!(job_id = %id, "job submitted");

        let engine = Arc::clone(&self.engine);
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            Self::run_pipeline(engine, store, registry, id).await;
        });

        snapshot
    }

    /// Returns a point-in-time snapshot of a job.
    pub async fn status(&self, job_id: &str) -> Result<JobSnapshot, JobError> {
        let registry = self.registry.lock().await;
        registry
            .jobs
            .get(job_id)
            .map(Job::snapshot)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Number of jobs tracked since startup.
    pub async fn job_count(&self) -> usize {
        self.registry.lock().await.jobs.len()
    }

    /// Subscribes to a job's snapshot stream.
    ///
    /// Snapshot capture, channel registration and delivery of the current
    /// snapshot happen under one lock acquisition, so the subscriber sees
    /// the current state plus every later state, with no gap and no
    /// reordering relative to concurrent updates.
    pub async fn subscribe(&self, job_id: &str) -> Result<JobSubscription, JobError> {
        let mut registry = self.registry.lock().await;
        let snapshot = registry
            .jobs
            .get(job_id)
            .map(Job::snapshot)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        let id = registry.next_subscriber_id;
        registry.next_subscriber_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        // The send cannot fail: we still hold the receiver.
        let _ = tx.send(snapshot);
        registry
            .subscribers
            .entry(job_id.to_string())
            .or_default()
            .push((id, tx));

        Ok(JobSubscription { id, receiver: rx })
    }

    /// Removes a subscriber channel. Idempotent; unknown jobs and already
    /// removed subscribers are no-ops.
    pub async fn unsubscribe(&self, job_id: &str, subscriber_id: SubscriberId) {
        let mut registry = self.registry.lock().await;
        if let Some(channels) = registry.subscribers.get_mut(job_id) {
            channels.retain(|(id, _)| *id != subscriber_id);
            if channels.is_empty() {
                registry.subscribers.remove(job_id);
            }
        }
    }

    /// Drives one job to a terminal state. Fully contained: whatever happens
    /// inside, the task records the outcome on the job and exits.
    async fn run_pipeline(
        engine: Arc<dyn ImageEngine>,
        store: Arc<dyn ArtifactStore>,
        registry: Arc<Mutex<Registry>>,
        job_id: String,
    ) {
        let job = {
            let reg = registry.lock().await;
            match reg.jobs.get(&job_id) {
                Some(job) => job.clone(),
                None => return,
            }
        };

        Self::apply_update(
            &registry,
            &job_id,
            JobUpdate {
                status: Some(JobStatus::Processing),
                progress: Some(PROGRESS_ACCEPTED),
                ..Default::default()
            },
        )
        .await;

        match Self::execute(engine, store, &job).await {
            Ok((result_url, metrics)) => {
                Self::apply_update(
                    &registry,
                    &job_id,
                    JobUpdate {
                        status: Some(JobStatus::Completed),
                        progress: Some(PROGRESS_DONE),
                        result_url: Some(result_url),
                        metrics: Some(metrics),
                        ..Default::default()
                    },
                )
                .await;
            }
            Err(failure) => {
                warn!(job_id = %job_id, error = %failure, "job failed");
                Self::apply_update(
                    &registry,
                    &job_id,
                    JobUpdate {
                        status: Some(JobStatus::Error),
                        progress: Some(PROGRESS_DONE),
                        error_message: Some(failure.to_string()),
                        ..Default::default()
                    },
                )
                .await;
            }
        }
    }

    /// The processing steps proper. Every `?` here short-circuits into the
    /// job's terminal error.
    async fn execute(
        engine: Arc<dyn ImageEngine>,
        store: Arc<dyn ArtifactStore>,
        job: &Job,
    ) -> Result<(String, MetricMap), PipelineFailure> {
        let source = store.resolve(&job.source).await?;
        let original = engine.load_image(&source.path).await?;

        let target = match &job.target_ref {
            Some(target_ref) => {
                let artifact = store.resolve(target_ref).await?;
                Some(engine.load_image(&artifact.path).await?)
            }
            None => None,
        };

        let (processed, operation_metrics) = engine
            .apply_operation(original.clone(), &job.operation, &job.params, target)
            .await?;

        let result_url = store.persist_result(&job.id, &processed).await?;

        // Comparison metrics first, operation metrics overlaid: on key
        // collision the operation's value wins.
        let mut metrics = engine.comparison_metrics(&original, &processed).await;
        metrics.extend(operation_metrics);

        Ok((result_url, metrics))
    }

    /// Applies a state transition and fans the snapshot out.
    ///
    /// Phase one, under the lock: mutate the job, take a snapshot, copy the
    /// subscriber set. Phase two, lock released: push the snapshot into each
    /// channel. A terminal job refuses any further mutation.
    async fn apply_update(registry: &Mutex<Registry>, job_id: &str, update: JobUpdate) {
        let (snapshot, channels) = {
            let mut reg = registry.lock().await;
            let Some(job) = reg.jobs.get_mut(job_id) else {
                return;
            };

            if job.status.is_terminal() {
                warn!(job_id, "ignoring update to terminal job");
                return;
            }

            if let Some(status) = update.status {
                job.status = status;
            }
            if let Some(progress) = update.progress {
                // Progress never decreases.
                job.progress = job.progress.max(progress.min(100));
            }
            if let Some(result_url) = update.result_url {
                job.result_url = Some(result_url);
            }
            if let Some(metrics) = update.metrics {
                job.metrics = Some(metrics);
            }
            if let Some(error_message) = update.error_message {
                job.error_message = Some(error_message);
            }
            if job.status.is_terminal() && job.finished_at.is_none() {
                job.finished_at = Some(Utc::now());
            }

            let snapshot = job.snapshot();
            let channels: Vec<_> = reg
                .subscribers
                .get(job_id)
                .map(|subs| subs.iter().map(|(_, tx)| tx.clone()).collect())
                .unwrap_or_default();
            (snapshot, channels)
        };

        for tx in channels {
            // A failed send only means the receiver is gone.
            let _ = tx.send(snapshot.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockArtifactStore, MockEngine};
    use serde_json::json;
    use std::time::Duration;

    fn orchestrator() -> (JobOrchestrator, Arc<MockEngine>, Arc<MockArtifactStore>) {
        let engine = Arc::new(MockEngine::new());
        let store = Arc::new(MockArtifactStore::new());
        let orchestrator = JobOrchestrator::new(
            Arc::clone(&engine) as Arc<dyn ImageEngine>,
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
        );
        (orchestrator, engine, store)
    }

    async fn wait_terminal(orchestrator: &JobOrchestrator, job_id: &str) -> JobSnapshot {
        for _ in 0..200 {
            let snapshot = orchestrator.status(job_id).await.unwrap();
            if snapshot.status.is_terminal() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} never reached a terminal state");
    }

    #[tokio::test]
    async fn test_submit_returns_queued_snapshot() {
        let (orchestrator, _engine, store) = orchestrator();
        store.add_artifact("img1").await;

        let snapshot = orchestrator
            .submit("img1".to_string(), "negative".to_string(), json!({}), None)
            .await;
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(snapshot.progress, 0);
        assert_eq!(orchestrator.job_count().await, 1);
    }

    #[tokio::test]
    async fn test_job_completes_with_merged_metrics() {
        let (orchestrator, engine, store) = orchestrator();
        store.add_artifact("img1").await;
        engine
            .set_comparison_metrics([("ssim", 0.9), ("psnr", 30.0), ("shared", 1.0)])
            .await;
        engine.set_operation_metrics([("shared", 2.0)]).await;

        let snapshot = orchestrator
            .submit("img1".to_string(), "negative".to_string(), json!({}), None)
            .await;
        let terminal = wait_terminal(&orchestrator, &snapshot.job_id).await;

        assert_eq!(terminal.status, JobStatus::Completed);
        assert_eq!(terminal.progress, 100);
        assert!(terminal.result_url.is_some());
        let metrics = terminal.metrics.unwrap();
        assert_eq!(metrics["ssim"], 0.9);
        // Operation metrics win on collision.
        assert_eq!(metrics["shared"], 2.0);
        assert!(terminal.error.is_none());
        assert!(terminal.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_unresolvable_source_fails_job() {
        let (orchestrator, _engine, _store) = orchestrator();

        let snapshot = orchestrator
            .submit("ghost".to_string(), "negative".to_string(), json!({}), None)
            .await;
        let terminal = wait_terminal(&orchestrator, &snapshot.job_id).await;

        assert_eq!(terminal.status, JobStatus::Error);
        assert_eq!(terminal.progress, 100);
        assert!(terminal.result_url.is_none());
        assert!(terminal.metrics.is_none());
        let error = terminal.error.unwrap();
        assert!(error.contains("ghost"), "unexpected message: {error}");
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (orchestrator, _engine, _store) = orchestrator();
        assert!(matches!(
            orchestrator.status("nope").await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            orchestrator.subscribe("nope").await,
            Err(JobError::NotFound(_))
        ));
        // Unsubscribe on an unknown job is a no-op.
        orchestrator.unsubscribe("nope", 7).await;
    }

    #[tokio::test]
    async fn test_subscriber_sees_ordered_stream_to_terminal() {
        let (orchestrator, _engine, store) = orchestrator();
        store.add_artifact("img1").await;

        let snapshot = orchestrator
            .submit("img1".to_string(), "negative".to_string(), json!({}), None)
            .await;
        let mut subscription = orchestrator.subscribe(&snapshot.job_id).await.unwrap();

        let mut progress_seen = Vec::new();
        let mut last = None;
        while let Some(update) = subscription.receiver.recv().await {
            progress_seen.push(update.progress);
            let terminal = update.status.is_terminal();
            last = Some(update);
            if terminal {
                break;
            }
        }

        let last = last.unwrap();
        assert_eq!(last.status, JobStatus::Completed);
        // First delivered snapshot is pre-terminal, progress never decreases.
        assert!(progress_seen.windows(2).all(|w| w[0] <= w[1]));

        orchestrator
            .unsubscribe(&snapshot.job_id, subscription.id)
            .await;
        // Second unsubscribe is a no-op.
        orchestrator
            .unsubscribe(&snapshot.job_id, subscription.id)
            .await;
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_terminal_snapshot() {
        let (orchestrator, _engine, store) = orchestrator();
        store.add_artifact("img1").await;

        let snapshot = orchestrator
            .submit("img1".to_string(), "negative".to_string(), json!({}), None)
            .await;
        wait_terminal(&orchestrator, &snapshot.job_id).await;

        let mut subscription = orchestrator.subscribe(&snapshot.job_id).await.unwrap();
        let first = subscription.receiver.recv().await.unwrap();
        assert_eq!(first.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_two_subscribers_receive_identical_terminal() {
        let (orchestrator, _engine, store) = orchestrator();
        store.add_artifact("img1").await;

        let snapshot = orchestrator
            .submit("img1".to_string(), "negative".to_string(), json!({}), None)
            .await;
        let mut a = orchestrator.subscribe(&snapshot.job_id).await.unwrap();
        let mut b = orchestrator.subscribe(&snapshot.job_id).await.unwrap();

        async fn drain_to_terminal(
            rx: &mut mpsc::UnboundedReceiver<JobSnapshot>,
        ) -> JobSnapshot {
            loop {
                let snapshot = rx.recv().await.expect("stream ended early");
                if snapshot.status.is_terminal() {
                    return snapshot;
                }
            }
        }

        let terminal_a = drain_to_terminal(&mut a.receiver).await;
        let terminal_b = drain_to_terminal(&mut b.receiver).await;
        assert_eq!(terminal_a, terminal_b);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_distinct_ids() {
        let (orchestrator, _engine, store) = orchestrator();
        store.add_artifact("img1").await;
        let orchestrator = Arc::new(orchestrator);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let orchestrator = Arc::clone(&orchestrator);
            handles.push(tokio::spawn(async move {
                orchestrator
                    .submit("img1".to_string(), "negative".to_string(), json!({}), None)
                    .await
                    .job_id
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }
        assert_eq!(ids.len(), 16);
        assert_eq!(orchestrator.job_count().await, 16);
    }

    #[tokio::test]
    async fn test_terminal_job_refuses_further_updates() {
        let (orchestrator, _engine, store) = orchestrator();
        store.add_artifact("img1").await;

        let snapshot = orchestrator
            .submit("img1".to_string(), "negative".to_string(), json!({}), None)
            .await;
        let terminal = wait_terminal(&orchestrator, &snapshot.job_id).await;
        let finished_at = terminal.finished_at;

        // Drive the guard directly: a second update must be a no-op.
        JobOrchestrator::apply_update(
            &orchestrator.registry,
            &snapshot.job_id,
            JobUpdate {
                status: Some(JobStatus::Error),
                error_message: Some("should be ignored".to_string()),
                ..Default::default()
            },
        )
        .await;

        let after = orchestrator.status(&snapshot.job_id).await.unwrap();
        assert_eq!(after.status, JobStatus::Completed);
        assert!(after.error.is_none());
        assert_eq!(after.finished_at, finished_at);
    }

    #[tokio::test]
    async fn test_one_failing_job_does_not_affect_others() {
        let (orchestrator, _engine, store) = orchestrator();
        store.add_artifact("good").await;

        let bad = orchestrator
            .submit("ghost".to_string(), "negative".to_string(), json!({}), None)
            .await;
        let good = orchestrator
            .submit("good".to_string(), "negative".to_string(), json!({}), None)
            .await;

        let bad_terminal = wait_terminal(&orchestrator, &bad.job_id).await;
        let good_terminal = wait_terminal(&orchestrator, &good.job_id).await;
        assert_eq!(bad_terminal.status, JobStatus::Error);
        assert_eq!(good_terminal.status, JobStatus::Completed);
    }
}
