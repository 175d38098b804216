//! In-process scheduler for deferred actions.
//!
//! [`MessageScheduler`] keeps jobs in memory and checks them once a second.
//! A due job is emitted as a [`ScheduledEvent`] on the channel passed to
//! [`MessageScheduler::start`]. One-shot jobs are then dropped; repeating
//! jobs move forward by their interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error, info, warn};

use concierge_agent::{CollabError, CollabResult, ScheduledAction, ScheduledJob, Scheduler};

use crate::error::{IntentError, Result};

const TICK: Duration = Duration::from_secs(1);

/// Event emitted when a job comes due.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub job_id: String,
    pub action: ScheduledAction,
    pub fired_at: DateTime<Utc>,
}

pub struct MessageScheduler {
    jobs: Arc<RwLock<Vec<ScheduledJob>>>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MessageScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Register a job. Ids must be unique.
    pub async fn add(&self, job: ScheduledJob) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.iter().any(|j| j.id == job.id) {
            return Err(IntentError::DuplicateJob { job_id: job.id });
        }
        info!(job_id = %job.id, execute_at = %job.execute_at, "job scheduled");
        jobs.push(job);
        Ok(())
    }

    pub async fn cancel(&self, id: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|j| j.id != id);
        if jobs.len() == before {
            return Err(IntentError::JobNotFound {
                job_id: id.to_string(),
            });
        }
        info!(job_id = %id, "job cancelled");
        Ok(())
    }

    /// Snapshot of pending jobs.
    pub async fn list(&self) -> Vec<ScheduledJob> {
        self.jobs.read().await.clone()
    }

    /// Start the background loop, emitting due jobs on `event_tx`.
    pub async fn start(&self, event_tx: mpsc::UnboundedSender<ScheduledEvent>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(IntentError::AlreadyRunning);
        }

        let running = Arc::clone(&self.running);
        let jobs = Arc::clone(&self.jobs);

        let handle = tokio::spawn(async move {
            info!("scheduler started");
            while running.load(Ordering::SeqCst) {
                {
                    let mut job_list = jobs.write().await;
                    fire_due(&mut job_list, Utc::now(), &event_tx);
                }
                tokio::time::sleep(TICK).await;
            }
            info!("scheduler stopped");
        });

        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    /// Stop the background loop and wait for it to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("stop called but scheduler is not running");
            return;
        }

        if let Some(handle) = self.handle.lock().await.take()
            && let Err(e) = handle.await
        {
            error!(error = %e, "scheduler task panicked during shutdown");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for MessageScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for MessageScheduler {
    async fn schedule(&self, job: ScheduledJob) -> CollabResult<()> {
        self.add(job).await.map_err(|e| CollabError::Scheduler {
            reason: e.to_string(),
        })
    }
}

/// Emit every job due at `now`, then drop one-shots and re-arm repeats.
fn fire_due(
    jobs: &mut Vec<ScheduledJob>,
    now: DateTime<Utc>,
    event_tx: &mpsc::UnboundedSender<ScheduledEvent>,
) {
    jobs.retain_mut(|job| {
        if job.execute_at > now {
            return true;
        }

        debug!(job_id = %job.id, "job fired");
        let event = ScheduledEvent {
            job_id: job.id.clone(),
            action: job.action.clone(),
            fired_at: now,
        };
        if let Err(e) = event_tx.send(event) {
            error!(job_id = %job.id, error = %e, "failed to send scheduled event");
        }

        match job.repeat_interval.and_then(|i| chrono::Duration::from_std(i).ok()) {
            Some(interval) if interval > chrono::Duration::zero() => {
                while job.execute_at <= now {
                    job.execute_at += interval;
                }
                true
            }
            _ => false,
        }
    });
}
