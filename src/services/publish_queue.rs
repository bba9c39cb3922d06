//! Deferred, de-duplicated publishing of step results.
//!
//! Jobs are keyed by test report id: while a report has a pending job,
//! enqueueing it again is a no-op. A report enqueued while its job is running
//! gets a new pending job, so the newer upload is published too. A worker loop claims due jobs with a
//! lease, so jobs held by a crashed worker become due again once the lease
//! runs out. Failed jobs are retried until `max_attempts` is reached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::QueueSettings;
use crate::error::{AppError, AppResult};

use super::step_result::StepResultPublisher;

/// Delay before a failed job is retried, multiplied by its attempt count.
pub const RETRY_BACKOFF_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

}

/// A claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishJob {
    pub id: Uuid,
    pub report_id: Uuid,
    /// Attempts including the current one.
    pub attempts: u32,
}

/// Durable job storage.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Add a job due at `run_at`. Returns `false` when the report already
    /// has a pending job.
    async fn enqueue(&self, report_id: Uuid, run_at: DateTime<Utc>) -> AppResult<bool>;

    /// Claim up to `limit` due jobs (pending and due, or running with an
    /// expired lease), leasing them until `lease_until`.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        lease_until: DateTime<Utc>,
    ) -> AppResult<Vec<PublishJob>>;

    async fn complete(&self, job_id: Uuid) -> AppResult<()>;

    /// Record a failed attempt. With `retry_at` the job becomes pending again,
    /// otherwise it is marked failed for good. A job whose report already has
    /// a newer pending job is marked failed instead of being rescheduled.
    async fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> AppResult<()>;
}

/// Work performed for one job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, report_id: Uuid) -> AppResult<()>;
}

#[async_trait]
impl JobHandler for StepResultPublisher {
    async fn handle(&self, report_id: Uuid) -> AppResult<()> {
        self.publish(report_id).await
    }
}

#[derive(Debug, Clone)]
struct MemoryJob {
    report_id: Uuid,
    status: JobStatus,
    run_at: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
    attempts: u32,
    last_error: Option<String>,
}

/// Job store kept in process memory.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, MemoryJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<Uuid, MemoryJob>>> {
        self.jobs
            .lock()
            .map_err(|_| AppError::Internal("job store lock poisoned".to_string()))
    }

    /// Status and attempt count of every job of a report.
    pub fn jobs_for(&self, report_id: Uuid) -> Vec<(JobStatus, u32, Option<String>)> {
        self.lock()
            .map(|jobs| {
                jobs.values()
                    .filter(|j| j.report_id == report_id)
                    .map(|j| (j.status, j.attempts, j.last_error.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, report_id: Uuid, run_at: DateTime<Utc>) -> AppResult<bool> {
        let mut jobs = self.lock()?;
        if jobs
            .values()
            .any(|j| j.report_id == report_id && j.status == JobStatus::Pending)
        {
            return Ok(false);
        }

        jobs.insert(
            Uuid::now_v7(),
            MemoryJob {
                report_id,
                status: JobStatus::Pending,
                run_at,
                locked_until: None,
                attempts: 0,
                last_error: None,
            },
        );
        Ok(true)
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        lease_until: DateTime<Utc>,
    ) -> AppResult<Vec<PublishJob>> {
        let mut jobs = self.lock()?;
        let mut due: Vec<(Uuid, DateTime<Utc>)> = jobs
            .iter()
            .filter(|(_, j)| match j.status {
                JobStatus::Pending => j.run_at <= now,
                JobStatus::Running => j.locked_until.is_some_and(|until| until <= now),
                _ => false,
            })
            .map(|(id, j)| (*id, j.run_at))
            .collect();
        due.sort_by_key(|(_, run_at)| *run_at);

        let mut claimed = Vec::new();
        for (id, _) in due.into_iter().take(limit) {
            if let Some(job) = jobs.get_mut(&id) {
                job.status = JobStatus::Running;
                job.locked_until = Some(lease_until);
                job.attempts += 1;
                claimed.push(PublishJob {
                    id,
                    report_id: job.report_id,
                    attempts: job.attempts,
                });
            }
        }
        Ok(claimed)
    }

    async fn complete(&self, job_id: Uuid) -> AppResult<()> {
        let mut jobs = self.lock()?;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))?;
        job.status = JobStatus::Done;
        job.locked_until = None;
        Ok(())
    }

    async fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let mut jobs = self.lock()?;
        let report_id = jobs
            .get(&job_id)
            .map(|j| j.report_id)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))?;
        let superseded = jobs.iter().any(|(id, j)| {
            *id != job_id && j.report_id == report_id && j.status == JobStatus::Pending
        });

        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))?;
        job.last_error = Some(error.to_string());
        job.locked_until = None;
        match retry_at {
            Some(_) if superseded => job.status = JobStatus::Failed,
            Some(run_at) => {
                job.status = JobStatus::Pending;
                job.run_at = run_at;
            }
            None => job.status = JobStatus::Failed,
        }
        Ok(())
    }
}

/// Producer side of the queue.
#[derive(Clone)]
pub struct PublishQueue {
    store: Arc<dyn JobStore>,
}

impl PublishQueue {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Schedule publishing of a report's step result after `delay_secs`.
    ///
    /// A report that already has a pending job is left alone.
    pub async fn enqueue(&self, report_id: Uuid, delay_secs: u64) -> AppResult<()> {
        let run_at = i64::try_from(delay_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|delay| Utc::now().checked_add_signed(delay))
            .ok_or_else(|| {
                AppError::InvalidInput(format!("Publish delay out of range: {}s", delay_secs))
            })?;
        let added = self.store.enqueue(report_id, run_at).await.map_err(|e| {
            AppError::QueuePublishFailed(format!("Failed to enqueue report {}: {}", report_id, e))
        })?;

        if added {
            info!(report_id = %report_id, delay_secs, "Step result publish enqueued");
        } else {
            debug!(report_id = %report_id, "Step result publish already queued");
        }
        Ok(())
    }
}

/// Consumer side: claims due jobs and runs them with bounded concurrency.
#[derive(Clone)]
pub struct PublishWorker {
    store: Arc<dyn JobStore>,
    handler: Arc<dyn JobHandler>,
    semaphore: Arc<Semaphore>,
    settings: QueueSettings,
}

impl PublishWorker {
    pub fn new(
        store: Arc<dyn JobStore>,
        handler: Arc<dyn JobHandler>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            store,
            handler,
            semaphore: Arc::new(Semaphore::new(settings.concurrency.max(1))),
            settings,
        }
    }

    /// Claim as many due jobs as there are free slots and start them.
    pub async fn dispatch_due(&self) -> AppResult<Vec<JoinHandle<()>>> {
        let free = self.semaphore.available_permits();
        if free == 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let lease_until = now + chrono::Duration::seconds(self.settings.lease_secs as i64);
        let jobs = self.store.claim_due(now, free, lease_until).await?;

        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|e| AppError::Internal(format!("worker semaphore closed: {}", e)))?;
            let worker = self.clone();

            handles.push(tokio::spawn(async move {
                worker.run_job(job).await;
                drop(permit);
            }));
        }
        Ok(handles)
    }

    async fn run_job(&self, job: PublishJob) {
        debug!(job_id = %job.id, report_id = %job.report_id, attempt = job.attempts, "Running publish job");

        let outcome = match self.handler.handle(job.report_id).await {
            Ok(()) => self.store.complete(job.id).await,
            Err(e) => {
                let retry_at = (job.attempts < self.settings.max_attempts).then(|| {
                    Utc::now() + chrono::Duration::seconds(RETRY_BACKOFF_SECS * job.attempts as i64)
                });
                error!(
                    job_id = %job.id,
                    report_id = %job.report_id,
                    attempt = job.attempts,
                    will_retry = retry_at.is_some(),
                    error = %e,
                    "Publish job failed"
                );
                self.store.fail(job.id, &e.to_string(), retry_at).await
            }
        };

        if let Err(e) = outcome {
            warn!(job_id = %job.id, error = %e, "Failed to record publish job outcome");
        }
    }

    /// Spawn the polling loop.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Starting publish worker (interval: {}s, concurrency: {}, max attempts: {})",
                self.settings.poll_interval_secs, self.settings.concurrency, self.settings.max_attempts
            );

            let mut ticker = interval(Duration::from_secs(self.settings.poll_interval_secs.max(1)));
            loop {
                ticker.tick().await;
                if let Err(e) = self.dispatch_due().await {
                    error!("Publish worker error: {}", e);
                }
            }
        })
    }
}
