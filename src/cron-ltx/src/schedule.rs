//! Recrawl scheduling.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use data_model_ltx::models::{JobStatus, RecrawlCandidate};
use data_model_ltx::store::JobStore;

use crate::api_client::Recrawler;
use crate::errors::Error;

/// A domain is due when it has never been crawled, or when its last job is no longer
/// processing and started at least one recrawl interval ago.
pub fn due_for_recrawl(candidate: &RecrawlCandidate, now: DateTime<Utc>) -> bool {
    if !candidate.domain.active {
        return false;
    }
    match &candidate.last_job {
        None => true,
        Some(job) if job.status == JobStatus::Processing => false,
        Some(job) => now - job.started_at >= candidate.domain.recrawl_interval(),
    }
}

/// Requests a recrawl for every due domain. Returns the number of jobs started.
pub async fn schedule_recrawls(
    store: &dyn JobStore,
    recrawler: &Arc<dyn Recrawler>,
    now: DateTime<Utc>,
) -> Result<usize, Error> {
    let due: Vec<String> = store
        .recrawl_candidates()
        .await?
        .into_iter()
        .filter(|c| due_for_recrawl(c, now))
        .map(|c| c.domain.hostname)
        .collect();
    tracing::info!("Found {} domains due for recrawl.", due.len());

    let mut started = 0;
    for hostname in due {
        match recrawler.recrawl(&hostname).await {
            Ok(job_id) => {
                tracing::info!("Started recrawl job {} for '{}'", job_id, hostname);
                started += 1;
            }
            Err(Error::JobInProgress) => {
                tracing::info!("Recrawl of '{}' skipped, a job is already in progress", hostname);
            }
            Err(e) => tracing::error!("Recrawl of '{}' failed: {}", hostname, e),
        }
    }
    Ok(started)
}
