use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::SqlType;
use serde::{Deserialize, Serialize};
use std::io::Write;
use uuid::Uuid;

// SQL type definitions for custom enums
// Note: These types use snake_case to match PostgreSQL type names
#[allow(non_camel_case_types)]
#[derive(SqlType, diesel::query_builder::QueryId, Debug, Clone, Copy)]
#[diesel(postgres_type(name = "job_status"))]
pub struct Job_status;

#[allow(non_camel_case_types)]
#[derive(SqlType, diesel::query_builder::QueryId, Debug, Clone, Copy)]
#[diesel(postgres_type(name = "job_kind"))]
pub struct Job_kind;

#[allow(non_camel_case_types)]
#[derive(SqlType, diesel::query_builder::QueryId, Debug, Clone, Copy)]
#[diesel(postgres_type(name = "artifact_kind"))]
pub struct Artifact_kind;

// JobStatus enum
/// Status of a crawl job.
///
/// A job is created `Processing` and moves exactly once into one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Job_status)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Crawl launched; pages are being received and processed
    Processing,
    /// Artifacts assembled (possibly zero) and statistics recorded
    Finished,
    /// Crawl or pipeline failed; the reason is in the job's stats
    Failed,
    /// Canceled out of band
    Canceled,
}

impl JobStatus {
    /// True for Finished, Failed and Canceled.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    /// Only processing -> {finished, failed, canceled} is allowed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(self, Self::Processing) && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql<Job_status, Pg> for JobStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Job_status, Pg> for JobStatus {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"processing" => Ok(JobStatus::Processing),
            b"finished" => Ok(JobStatus::Finished),
            b"failed" => Ok(JobStatus::Failed),
            b"canceled" => Ok(JobStatus::Canceled),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

// JobKind enum
/// Type of crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Job_kind)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// First crawl of a domain: every page is new
    New,
    /// Recrawl of a domain that has been crawled before
    Update,
}

impl ToSql<Job_kind, Pg> for JobKind {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match self {
            JobKind::New => "new",
            JobKind::Update => "update",
        };
        out.write_all(s.as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Job_kind, Pg> for JobKind {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"new" => Ok(JobKind::New),
            b"update" => Ok(JobKind::Update),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

// ArtifactKind enum
/// Kind of aggregate document produced by a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Artifact_kind)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Condensed index: one linked entry per changed page (llms.txt)
    Index,
    /// Full-content archive of every changed page (llms-full.txt)
    Full,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Index, ArtifactKind::Full];

    /// File name the artifact is stored under.
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Index => "llms.txt",
            ArtifactKind::Full => "llms-full.txt",
        }
    }
}

impl ToSql<Artifact_kind, Pg> for ArtifactKind {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match self {
            ArtifactKind::Index => "index",
            ArtifactKind::Full => "full",
        };
        out.write_all(s.as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Artifact_kind, Pg> for ArtifactKind {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"index" => Ok(ArtifactKind::Index),
            b"full" => Ok(ArtifactKind::Full),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

// domains table model
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::domains)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Domain {
    pub id: Uuid,
    /// Normalized hostname, e.g. `example.com`.
    pub hostname: String,
    pub active: bool,
    pub recrawl_interval_s: i64,
    /// Model used for page summaries.
    pub model: String,
    /// Extra summarization instructions.
    pub prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Domain {
    pub const DEFAULT_RECRAWL_INTERVAL_S: i64 = 86_400;
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// An active domain with the default recrawl interval and model.
    /// The hostname must already be normalized.
    pub fn new(hostname: &str) -> Self {
        Domain {
            id: Uuid::new_v4(),
            hostname: hostname.to_string(),
            active: true,
            recrawl_interval_s: Self::DEFAULT_RECRAWL_INTERVAL_S,
            model: Self::DEFAULT_MODEL.to_string(),
            prompt: None,
            created_at: Utc::now(),
        }
    }

    pub fn recrawl_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.recrawl_interval_s.max(0))
    }
}

// jobs table model
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Job {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    /// The crawl provider's id for this crawl. Inbound callbacks must carry the same value.
    pub external_job_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pages_received: i32,
    pub pages_processed: i32,
    /// The provider signalled that no further page events will be sent.
    pub stream_closed: bool,
    pub stream_closed_at: Option<DateTime<Utc>>,
    /// Set exactly once, by whoever wins the transition to assembly.
    pub assembly_claimed: bool,
    pub stats: serde_json::Value,
}

impl Job {
    /// A freshly launched job: processing, zeroed counters, nothing claimed.
    pub fn new(domain_id: Uuid, kind: JobKind) -> Self {
        Job {
            id: Uuid::new_v4(),
            domain_id,
            kind,
            status: JobStatus::Processing,
            external_job_id: None,
            started_at: Utc::now(),
            finished_at: None,
            pages_received: 0,
            pages_processed: 0,
            stream_closed: false,
            stream_closed_at: None,
            assembly_claimed: false,
            stats: serde_json::json!({}),
        }
    }

    /// Every received page has been processed and the provider closed the stream.
    /// A stream that closed without any pages is never ready.
    pub fn is_ready_for_assembly(&self) -> bool {
        self.status == JobStatus::Processing
            && self.stream_closed
            && self.pages_received > 0
            && self.pages_processed == self.pages_received
    }

    /// Pages received but not yet processed.
    pub fn outstanding_pages(&self) -> i32 {
        (self.pages_received - self.pages_processed).max(0)
    }
}

// pages table model
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::pages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Page {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub url: String,
    pub last_known_version: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Page {
    pub fn new(domain_id: Uuid, url: &str) -> Self {
        Page {
            id: Uuid::new_v4(),
            domain_id,
            url: url.to_string(),
            last_known_version: None,
            created_at: Utc::now(),
        }
    }
}

// page_versions table model
/// The outcome of processing one page within one job. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::page_versions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PageVersion {
    pub id: Uuid,
    pub page_id: Uuid,
    pub job_id: Uuid,
    pub raw_path: String,
    pub processed_path: String,
    pub fingerprint: String,
    pub prev_fingerprint: Option<String>,
    pub similarity_score: f64,
    pub changed_enough: bool,
    pub reason: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A page version joined with its page's URL.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPage {
    pub url: String,
    pub version: PageVersion,
}

// page_deliveries table model
/// Idempotency key for one page delivery within one job.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::page_deliveries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PageDelivery {
    pub job_id: Uuid,
    pub url: String,
    pub received_at: DateTime<Utc>,
}

// artifacts table model
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::artifacts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Artifact {
    pub id: Uuid,
    pub job_id: Uuid,
    pub domain_id: Uuid,
    pub kind: ArtifactKind,
    pub blob_path: String,
    /// 1-based, gapless per (domain, kind).
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// Counts of page versions written by a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCounts {
    pub total: i64,
    pub changed: i64,
}

/// An active domain together with its most recent job, used to schedule recrawls.
#[derive(Debug, Clone, PartialEq)]
pub struct RecrawlCandidate {
    pub domain: Domain,
    pub last_job: Option<Job>,
}

/// Failure reason for a crawl that closed without delivering any page.
pub const EMPTY_CRAWL_REASON: &str = "crawl completed without reporting any pages";

// API Payload Types

/// Input payload for POST /api/ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPayload {
    pub domain_id: Uuid,
    pub kind: JobKind,
}

/// Input payload for POST /api/recrawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecrawlPayload {
    pub hostname: String,
}

/// Input payload for endpoints that accept a job id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobIdPayload {
    pub job_id: Uuid,
}

/// Response payload containing a job ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobIdResponse {
    pub job_id: Uuid,
}

/// Query for GET /api/llms_txt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactQuery {
    pub hostname: String,
    pub kind: Option<ArtifactKind>,
}

/// Response payload for GET /api/llms_txt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactResponse {
    pub job_id: Uuid,
    pub kind: ArtifactKind,
    pub version: i32,
    pub content: String,
}
