//! The relational store behind the crawl pipeline.
//!
//! Every mutation of a job's counters, claim flag or status goes through one of
//! the conditional operations on [`JobStore`]. Callers never read a job, change
//! it in memory and write it back.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::PoolError;
use crate::models::{Artifact, ArtifactKind, Domain, Job, JobPage, Page, PageVersion, RecrawlCandidate, VersionCounts};

/// Name of the partial unique index that allows one processing job per domain.
pub const ACTIVE_JOB_CONSTRAINT: &str = "jobs_one_active_per_domain";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("domain {0} already has a processing job")]
    ActiveJobExists(Uuid),
    #[error("job {0} is no longer processing")]
    JobNotProcessing(Uuid),
    #[error("database error: {0}")]
    Db(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
}

impl From<PoolError> for StoreError {
    fn from(e: PoolError) -> Self {
        StoreError::Pool(e.to_string())
    }
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Transient failures that are worth retrying: the pool could not hand out a
    /// connection, the connection dropped, or a serializable transaction lost a race.
    pub fn is_retriable(&self) -> bool {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};
        match self {
            StoreError::Pool(_) => true,
            StoreError::Db(DieselError::DatabaseError(kind, _)) => matches!(
                kind,
                DatabaseErrorKind::SerializationFailure | DatabaseErrorKind::ClosedConnection
            ),
            _ => false,
        }
    }
}

/// Result of recording a page delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// First delivery of this url for the job; `pages_received` was incremented.
    Accepted(Job),
    /// The (job, url) key was already recorded. Nothing changed.
    Duplicate,
    /// The job left `processing` before the delivery could be counted.
    JobNotProcessing,
}

/// Result of recording a processed page version.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionOutcome {
    /// Version written and `pages_processed` incremented.
    Recorded(Job),
    /// A version for this (page, job) already exists. Nothing changed.
    Duplicate,
    /// The job left `processing`; the version was not written.
    JobNotProcessing,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    // ---- domains ----

    async fn insert_domain(&self, domain: &Domain) -> Result<(), StoreError>;

    async fn get_domain(&self, domain_id: Uuid) -> Result<Domain, StoreError>;

    async fn find_domain_by_hostname(&self, hostname: &str) -> Result<Option<Domain>, StoreError>;

    /// Every active domain paired with its most recently started job.
    async fn recrawl_candidates(&self) -> Result<Vec<RecrawlCandidate>, StoreError>;

    /// Whether the domain has ever had a job reach `finished`.
    async fn has_finished_job(&self, domain_id: Uuid) -> Result<bool, StoreError>;

    // ---- jobs ----

    /// Inserts a new job. Fails with [`StoreError::ActiveJobExists`] when the domain
    /// already holds a processing job.
    async fn create_job(&self, job: &Job) -> Result<Job, StoreError>;

    async fn count_active_jobs(&self) -> Result<i64, StoreError>;

    /// Stores the provider's id for a processing job. Returns `None` if the job is no longer processing.
    async fn set_external_job_id(&self, job_id: Uuid, external_job_id: &str) -> Result<Option<Job>, StoreError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Job, StoreError>;

    async fn list_active_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Records the (job, url) idempotency key and increments `pages_received`, atomically.
    async fn record_delivery(&self, job_id: Uuid, url: &str) -> Result<DeliveryOutcome, StoreError>;

    /// Sets `stream_closed` on a processing job and returns its current state.
    /// Closing an already closed stream returns the job unchanged.
    async fn mark_stream_closed(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Compare-and-set on `assembly_claimed`, guarded by the readiness predicate.
    /// Returns true for exactly one caller per job.
    async fn try_claim_assembly(&self, job_id: Uuid) -> Result<bool, StoreError>;

    /// processing -> finished, merging `stats` into the job's stats. Requires the
    /// assembly claim. Returns `None` when the job was not eligible.
    async fn finish_job(&self, job_id: Uuid, stats: serde_json::Value) -> Result<Option<Job>, StoreError>;

    /// processing -> failed, recording `error` under `stats.error`.
    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<Option<Job>, StoreError>;

    /// processing -> canceled.
    async fn cancel_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;

    // ---- pages ----

    /// Returns the page for (domain, url), creating it on first sight.
    async fn upsert_page(&self, domain_id: Uuid, url: &str) -> Result<Page, StoreError>;

    /// The most recent version of a page written by a job other than `job_id`.
    async fn previous_version(&self, page_id: Uuid, job_id: Uuid) -> Result<Option<PageVersion>, StoreError>;

    async fn has_page_version(&self, page_id: Uuid, job_id: Uuid) -> Result<bool, StoreError>;

    /// Writes an immutable page version and increments `pages_processed` in one
    /// transaction that only commits while the job is processing.
    async fn record_page_version(&self, version: &PageVersion) -> Result<VersionOutcome, StoreError>;

    /// The job's versions joined with their URLs, ordered by URL.
    async fn versions_for_job(&self, job_id: Uuid, changed_only: bool) -> Result<Vec<JobPage>, StoreError>;

    async fn version_counts(&self, job_id: Uuid) -> Result<VersionCounts, StoreError>;

    // ---- artifacts ----

    /// Inserts an artifact with the next version for (domain, kind).
    async fn create_artifact(
        &self,
        job_id: Uuid,
        domain_id: Uuid,
        kind: ArtifactKind,
        blob_path: &str,
    ) -> Result<Artifact, StoreError>;

    async fn latest_artifact(&self, domain_id: Uuid, kind: ArtifactKind) -> Result<Option<Artifact>, StoreError>;

    async fn artifacts_for_job(&self, job_id: Uuid) -> Result<Vec<Artifact>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    #[test]
    fn test_retriable_classification() {
        assert!(StoreError::Pool("timed out".into()).is_retriable());
        assert!(
            StoreError::Db(DieselError::DatabaseError(
                DatabaseErrorKind::SerializationFailure,
                Box::new("could not serialize".to_string()),
            ))
            .is_retriable()
        );
        assert!(!StoreError::Db(DieselError::NotFound).is_retriable());
        assert!(!StoreError::ActiveJobExists(Uuid::new_v4()).is_retriable());
        assert!(!StoreError::not_found("job", Uuid::new_v4()).is_retriable());
    }
}
