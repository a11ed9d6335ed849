//! Fails processing jobs that can no longer finish on their own.

use std::time::Duration;

use chrono::{DateTime, Utc};
use data_model_ltx::models::{EMPTY_CRAWL_REASON, Job, JobStatus};
use data_model_ltx::store::JobStore;
use uuid::Uuid;

use crate::errors::Error;

#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// How long a closed stream may sit without any page before the job is failed.
    pub empty_crawl_grace: Duration,
    /// Upper bound on how long any job may stay processing.
    pub job_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            empty_crawl_grace: Duration::from_secs(600),
            job_timeout: Duration::from_secs(6 * 60 * 60),
        }
    }
}

fn older_than(at: DateTime<Utc>, now: DateTime<Utc>, limit: Duration) -> bool {
    (now - at).to_std().map(|age| age >= limit).unwrap_or(false)
}

/// Why the job should be failed, if it should.
pub fn stale_reason(job: &Job, now: DateTime<Utc>, config: &SweepConfig) -> Option<String> {
    if job.status != JobStatus::Processing {
        return None;
    }
    if job.stream_closed && job.pages_received == 0 {
        let closed_at = job.stream_closed_at.unwrap_or(job.started_at);
        if older_than(closed_at, now, config.empty_crawl_grace) {
            return Some(EMPTY_CRAWL_REASON.to_string());
        }
    }
    if older_than(job.started_at, now, config.job_timeout) {
        return Some(format!(
            "Job timed out after {}s ({} of {} pages processed)",
            config.job_timeout.as_secs(),
            job.pages_processed,
            job.pages_received
        ));
    }
    None
}

/// Fails every stale processing job. Returns the ids of the jobs this sweep failed.
pub async fn sweep_stale_jobs(store: &dyn JobStore, config: &SweepConfig, now: DateTime<Utc>) -> Result<Vec<Uuid>, Error> {
    let mut failed = Vec::new();
    for job in store.list_active_jobs().await? {
        let Some(reason) = stale_reason(&job, now, config) else {
            continue;
        };
        // None: the job finished between the listing and this update.
        if store.fail_job(job.id, &reason).await?.is_some() {
            tracing::warn!("[job: {}] Failed stale job: {}", job.id, reason);
            failed.push(job.id);
        }
    }
    Ok(failed)
}
