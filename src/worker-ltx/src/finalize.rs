//! Job Finalizer.

use chrono::Utc;
use data_model_ltx::models::{Job, JobStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Pipeline};

/// Statistics merged into a finished job's `stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub duration_ms: i64,
    pub total_pages_processed: i64,
    pub changed_pages: i64,
    pub unchanged_pages: i64,
    pub artifact_count: usize,
    pub artifact_ids: Vec<Uuid>,
}

impl Pipeline {
    /// Computes the job's statistics and moves it to `finished`.
    /// Returns `None` when the job was already terminal.
    pub async fn finalize(&self, job_id: Uuid, artifact_ids: Vec<Uuid>) -> Result<Option<Job>, Error> {
        let job = self.load_job(job_id).await?;
        if job.status != JobStatus::Processing {
            tracing::debug!("[job: {}] Already {}, nothing to finalize", job_id, job.status);
            return Ok(None);
        }

        let counts = self
            .retry("count versions", || self.store.version_counts(job_id))
            .await?;
        let stats = JobStats {
            duration_ms: (Utc::now() - job.started_at).num_milliseconds().max(0),
            total_pages_processed: counts.total,
            changed_pages: counts.changed,
            unchanged_pages: counts.total - counts.changed,
            artifact_count: artifact_ids.len(),
            artifact_ids,
        };
        let value = serde_json::to_value(&stats).map_err(core_ltx::Error::from)?;

        match self.retry("finish job", || self.store.finish_job(job_id, value.clone())).await? {
            Some(finished) => {
                tracing::info!(
                    "[job: {}] Finished in {}ms: {} pages, {} changed, {} artifacts",
                    job_id,
                    stats.duration_ms,
                    stats.total_pages_processed,
                    stats.changed_pages,
                    stats.artifact_count
                );
                Ok(Some(finished))
            }
            None => {
                tracing::debug!("[job: {}] Finalize was a no-op, job left processing", job_id);
                Ok(None)
            }
        }
    }
}
