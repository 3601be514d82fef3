//! Single-flight background cache warming.
//!
//! At most one job runs at a time. Starting a new job cancels the running
//! one and waits for it to stop before sampling again, so once `start`,
//! `quiesce` or `exclusive` has joined a job, that job issues no further
//! fetches. Cancellation is checked between groups only; a fetch that is
//! already in flight runs to completion, retries included.

use std::future::Future;
use std::sync::Arc;

use geoshield_core::{CoordinateResolver, LocationGroup, LocationSource};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::job::{JobState, PrefetchAck, PrefetchError, PrefetchReport};
use crate::sampling::sample_groups;

struct ActiveJob {
    id: Uuid,
    sampled: usize,
    token: CancellationToken,
    handle: JoinHandle<PrefetchReport>,
}

impl ActiveJob {
    async fn join(self, state: &RwLock<JobState>) -> PrefetchReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Prefetch job {} aborted: {}", self.id, e);
                *state.write() = JobState::Cancelled;
                PrefetchReport {
                    job_id: self.id,
                    state: JobState::Cancelled,
                    sampled: self.sampled,
                    attempted: 0,
                    failed: 0,
                }
            }
        }
    }
}

pub struct PrefetchScheduler {
    source: Arc<dyn LocationSource>,
    resolver: Arc<dyn CoordinateResolver>,
    /// Held across joins so starts and exclusive sections are serialized
    current: Mutex<Option<ActiveJob>>,
    state: Arc<RwLock<JobState>>,
}

impl PrefetchScheduler {
    pub fn new(source: Arc<dyn LocationSource>, resolver: Arc<dyn CoordinateResolver>) -> Self {
        Self {
            source,
            resolver,
            current: Mutex::new(None),
            state: Arc::new(RwLock::new(JobState::Idle)),
        }
    }

    /// State of the most recent job (`Idle` if none was ever started).
    pub fn state(&self) -> JobState {
        *self.state.read()
    }

    /// Supersede any running job and start warming `percentage` percent of
    /// the location groups. Returns as soon as the new job is spawned.
    pub async fn start(&self, percentage: f64) -> Result<PrefetchAck, PrefetchError> {
        let mut current = self.current.lock().await;

        if let Some(report) = self.stop(&mut current).await {
            tracing::info!(
                "Superseded prefetch job {} ({}, {}/{} attempted)",
                report.job_id,
                report.state,
                report.attempted,
                report.sampled
            );
        }

        let groups = self
            .source
            .list_location_groups()
            .await
            .map_err(PrefetchError::Source)?;
        let selected = sample_groups(&groups, percentage, &mut rand::thread_rng());

        let id = Uuid::new_v4();
        let sampled = selected.len();
        let token = CancellationToken::new();

        tracing::info!(
            "Starting prefetch job {}: {} of {} location groups ({}%)",
            id,
            sampled,
            groups.len(),
            percentage
        );

        *self.state.write() = JobState::Running;
        let handle = tokio::spawn(run_job(
            id,
            selected,
            Arc::clone(&self.resolver),
            token.clone(),
            Arc::clone(&self.state),
        ));

        *current = Some(ActiveJob {
            id,
            sampled,
            token,
            handle,
        });

        Ok(PrefetchAck {
            job_id: id,
            sample_size: sampled,
        })
    }

    /// Cancel and join the running job without starting another.
    pub async fn quiesce(&self) -> Option<PrefetchReport> {
        let mut current = self.current.lock().await;
        self.stop(&mut current).await
    }

    /// Quiesce, then run `op` with prefetching held off until it finishes.
    ///
    /// The scheduler lock is held while `op` runs and is not reentrant: an
    /// `op` that awaits `start`, `quiesce`, `wait` or `exclusive` on this
    /// same scheduler never completes.
    pub async fn exclusive<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut current = self.current.lock().await;
        if let Some(report) = self.stop(&mut current).await {
            tracing::debug!("Prefetch job {} stopped for exclusive operation", report.job_id);
        }
        op().await
    }

    /// Wait for the running job to finish on its own.
    pub async fn wait(&self) -> Option<PrefetchReport> {
        let mut current = self.current.lock().await;
        let job = current.take()?;
        Some(job.join(&self.state).await)
    }

    async fn stop(&self, current: &mut Option<ActiveJob>) -> Option<PrefetchReport> {
        let job = current.take()?;
        job.token.cancel();
        Some(job.join(&self.state).await)
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        if let Some(job) = self.current.get_mut() {
            job.token.cancel();
        }
    }
}

async fn run_job(
    id: Uuid,
    groups: Vec<LocationGroup>,
    resolver: Arc<dyn CoordinateResolver>,
    token: CancellationToken,
    state: Arc<RwLock<JobState>>,
) -> PrefetchReport {
    let sampled = groups.len();
    let mut attempted = 0;
    let mut failed = 0;

    for group in &groups {
        if token.is_cancelled() {
            break;
        }

        attempted += 1;
        if let Err(e) = resolver
            .resolve_coordinates(group.latitude, group.longitude)
            .await
        {
            failed += 1;
            tracing::warn!("Prefetch failed for group {}: {:#}", group.group_id, e);
        }
    }

    // A cancel raised after the last group still counts as completed
    let cancelled = token.is_cancelled() && attempted < sampled;
    let final_state = JobState::Running.on_exit(cancelled);
    *state.write() = final_state;

    tracing::info!(
        "Prefetch job {} {}: {} attempted, {} failed",
        id,
        final_state,
        attempted,
        failed
    );

    PrefetchReport {
        job_id: id,
        state: final_state,
        sampled,
        attempted,
        failed,
    }
}
