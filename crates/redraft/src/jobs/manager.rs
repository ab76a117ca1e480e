//! In-memory job registry with processing-timeout and cleanup timers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::config::JobSettings;
use crate::jobs::events::{JobEvent, JobEventBroadcaster};
use crate::jobs::record::{Job, JobCounts, JobStatus};

/// Failure reason stamped when a plain status update moves a job to failed
/// without carrying a message of its own.
const UPDATE_FAILURE_REASON: &str = "processing failed";

type TimerMap = HashMap<String, JoinHandle<()>>;

// ─── Helpers ────────────────────────────────────────────────────────────────

fn lock_timers(timers: &Mutex<TimerMap>) -> MutexGuard<'_, TimerMap> {
    match timers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Job timer lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn abort_timer(timers: &Mutex<TimerMap>, job_id: &str) {
    if let Some(handle) = lock_timers(timers).remove(job_id) {
        // No-op if the task already ran to completion.
        handle.abort();
    }
}

// ─── JobManager ─────────────────────────────────────────────────────────────

/// Tracks every in-flight and recently finished OCR job.
///
/// Cloning is cheap (inner `Arc`); the hosting application creates one
/// manager at startup and hands clones to its request handlers and the OCR
/// invocation path. Status transitions spawn timer tasks, so state-changing
/// calls must run inside a tokio runtime.
///
/// Lookups and transitions addressing an unknown id return `None` or
/// `false` instead of failing, since records disappear on their own once
/// the cleanup timer fires.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    settings: JobSettings,
    jobs: RwLock<HashMap<String, Job>>,
    /// Processing-timeout timers, one per job currently processing.
    timeout_timers: Mutex<TimerMap>,
    /// Cleanup timers, one per finished job awaiting reclamation.
    cleanup_timers: Mutex<TimerMap>,
    events: JobEventBroadcaster,
}

impl ManagerInner {
    fn jobs_read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn jobs_write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl JobManager {
    /// Creates a new manager with the given settings.
    pub fn new(mut settings: JobSettings) -> Self {
        // broadcast::channel panics on zero capacity.
        settings.event_capacity = settings.event_capacity.max(1);

        let events = JobEventBroadcaster::new(settings.event_capacity);
        Self {
            inner: Arc::new(ManagerInner {
                settings,
                jobs: RwLock::new(HashMap::new()),
                timeout_timers: Mutex::new(TimerMap::new()),
                cleanup_timers: Mutex::new(TimerMap::new()),
                events,
            }),
        }
    }

    /// Registers a new queued job for an uploaded document and returns its
    /// snapshot. No timer runs until the job enters processing.
    pub fn create(&self, source_reference: impl Into<String>) -> Job {
        let job = Job::new(source_reference);
        log::debug!("Created job {} for {}", job.id, job.source_reference);

        self.inner.jobs_write().insert(job.id.clone(), job.clone());
        self.inner.events.send(JobEvent::created(&job));
        job
    }

    /// Returns a snapshot of the job, or `None` when the id is unknown.
    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.inner.jobs_read().get(job_id).cloned()
    }

    /// Moves a tracked job to a new status, optionally updating its
    /// progress. Returns false when the id is unknown, the job is already
    /// finished, or the target status is queued (which is only ever entered
    /// at creation).
    ///
    /// Entering processing arms the timeout timer; entering it again
    /// restarts the allowance from scratch. Entering a terminal status
    /// stamps the completion timestamp and schedules cleanup.
    pub fn update_status(&self, job_id: &str, status: JobStatus, progress: Option<u8>) -> bool {
        match status {
            JobStatus::Queued => false,
            JobStatus::Processing => self.mark_processing(job_id, progress),
            JobStatus::Done => self.finalize(job_id, JobStatus::Done, progress, None).is_some(),
            JobStatus::Failed => self
                .finalize(
                    job_id,
                    JobStatus::Failed,
                    progress,
                    Some(UPDATE_FAILURE_REASON.to_string()),
                )
                .is_some(),
            JobStatus::Cancelled => self
                .finalize(job_id, JobStatus::Cancelled, progress, None)
                .is_some(),
        }
    }

    /// Force-fails a job with the given message, recorded verbatim.
    /// Returns false when the id is unknown or the job already finished.
    pub fn fail(&self, job_id: &str, message: impl Into<String>) -> bool {
        self.finalize(job_id, JobStatus::Failed, None, Some(message.into()))
            .is_some()
    }

    /// Cancels a job that has not finished yet. Returns false when the id
    /// is unknown or the job already reached a terminal status.
    pub fn cancel(&self, job_id: &str) -> bool {
        self.finalize(job_id, JobStatus::Cancelled, None, None)
            .is_some()
    }

    /// Removes a finished job immediately instead of waiting for its
    /// cleanup timer. Jobs that are still queued or processing are refused
    /// so in-flight work cannot be dropped by accident.
    pub fn remove(&self, job_id: &str) -> bool {
        {
            let mut jobs = self.inner.jobs_write();
            let finished = match jobs.get(job_id) {
                Some(job) => job.is_finished(),
                None => return false,
            };
            if !finished {
                return false;
            }
            jobs.remove(job_id);
        }

        abort_timer(&self.inner.cleanup_timers, job_id);
        log::debug!("Job {} removed", job_id);
        self.inner.events.send(JobEvent::removed(job_id));
        true
    }

    /// Returns per-status totals for everything currently tracked.
    pub fn counts(&self) -> JobCounts {
        let jobs = self.inner.jobs_read();
        let mut counts = JobCounts::default();

        for job in jobs.values() {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Done => counts.done += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
            }
            counts.total += 1;
        }

        counts
    }

    /// Returns snapshots of all tracked jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let jobs = self.inner.jobs_read();
        let mut result: Vec<Job> = jobs.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    /// Creates a new subscriber for lifecycle events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the settings this manager runs with.
    pub fn settings(&self) -> &JobSettings {
        &self.inner.settings
    }

    /// Moves the job to processing and (re)arms its timeout timer.
    fn mark_processing(&self, job_id: &str, progress: Option<u8>) -> bool {
        let snapshot = {
            let mut jobs = self.inner.jobs_write();
            let job = match jobs.get_mut(job_id) {
                Some(job) => job,
                None => return false,
            };
            if job.status.is_terminal() {
                return false;
            }

            job.status = JobStatus::Processing;
            if let Some(progress) = progress {
                job.progress = progress.min(100);
            }
            job.clone()
        };

        self.arm_timeout(&snapshot.id);
        log::debug!(
            "Job {} is processing (progress {}%)",
            snapshot.id,
            snapshot.progress
        );
        self.inner.events.send(JobEvent::updated(&snapshot));
        true
    }

    /// Moves a non-terminal job into a terminal status: stamps the
    /// completion timestamp, aborts the timeout timer and schedules
    /// cleanup. Returns `None` when the id is unknown or the job already
    /// finished.
    fn finalize(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: Option<u8>,
        error: Option<String>,
    ) -> Option<Job> {
        let snapshot = {
            let mut jobs = self.inner.jobs_write();
            let job = jobs.get_mut(job_id)?;
            if job.status.is_terminal() {
                return None;
            }

            job.status = status;
            if let Some(progress) = progress {
                job.progress = progress.min(100);
            }
            if status == JobStatus::Done {
                job.progress = 100;
            }
            job.error = error;
            job.completed_at = Some(Utc::now());
            job.clone()
        };

        abort_timer(&self.inner.timeout_timers, &snapshot.id);
        self.arm_cleanup(&snapshot.id);
        log::debug!("Job {} finished as {}", snapshot.id, snapshot.status);
        self.inner.events.send(JobEvent::updated(&snapshot));
        Some(snapshot)
    }

    /// Starts the processing-timeout timer for a job, replacing any timer
    /// from an earlier processing entry.
    fn arm_timeout(&self, job_id: &str) {
        abort_timer(&self.inner.timeout_timers, job_id);

        let timeout = self.inner.settings.processing_timeout();
        let manager = self.clone();
        let id = job_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            manager.timeout_fired(&id, timeout);
        });

        lock_timers(&self.inner.timeout_timers).insert(job_id.to_string(), handle);
    }

    /// Timer body for the processing allowance.
    ///
    /// Aborting only covers the sleeping window; a timer that is already
    /// executing resolves against current state, so the terminal check in
    /// `finalize` is what actually decides whether the job gets failed.
    fn timeout_fired(&self, job_id: &str, timeout: Duration) {
        let _span = tracing::info_span!("job_timeout", job_id = %job_id).entered();

        let message = format!("Processing timed out after {}s", timeout.as_secs());
        if self.finalize(job_id, JobStatus::Failed, None, Some(message)).is_some() {
            log::info!(
                "Job {} force-failed after exceeding its {}s processing allowance",
                job_id,
                timeout.as_secs()
            );
        }
    }

    /// Starts the cleanup timer that reclaims a finished job's record.
    fn arm_cleanup(&self, job_id: &str) {
        let delay = self.inner.settings.cleanup_delay();
        let manager = self.clone();
        let id = job_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.cleanup_fired(&id);
        });

        let stale = lock_timers(&self.inner.cleanup_timers).insert(job_id.to_string(), handle);
        if let Some(stale) = stale {
            stale.abort();
        }
    }

    /// Timer body for registry cleanup: forgets the finished job entirely.
    fn cleanup_fired(&self, job_id: &str) {
        let _span = tracing::info_span!("job_cleanup", job_id = %job_id).entered();

        let removed = self.inner.jobs_write().remove(job_id).is_some();
        lock_timers(&self.inner.cleanup_timers).remove(job_id);

        if removed {
            log::info!("Job {} expired from the registry", job_id);
            self.inner.events.send(JobEvent::removed(job_id));
        }
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new(JobSettings::default())
    }
}
