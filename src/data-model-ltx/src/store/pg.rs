use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use super::{ACTIVE_JOB_CONSTRAINT, DeliveryOutcome, JobStore, StoreError, VersionOutcome};
use crate::db::DbPool;
use crate::models::{
    Artifact, ArtifactKind, Domain, Job, JobPage, JobStatus, Page, PageDelivery, PageVersion, RecrawlCandidate,
    VersionCounts,
};
use crate::schema::{artifact_counters, artifacts, domains, jobs, page_deliveries, page_versions, pages};

/// Postgres-backed [`JobStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn is_active_job_violation(e: &DieselError) -> bool {
    match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            info.constraint_name() == Some(ACTIVE_JOB_CONSTRAINT)
        }
        _ => false,
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert_domain(&self, domain: &Domain) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(domains::table)
            .values(domain)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_domain(&self, domain_id: Uuid) -> Result<Domain, StoreError> {
        let mut conn = self.pool.get().await?;
        domains::table
            .find(domain_id)
            .select(Domain::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| StoreError::not_found("domain", domain_id))
    }

    async fn find_domain_by_hostname(&self, hostname: &str) -> Result<Option<Domain>, StoreError> {
        let mut conn = self.pool.get().await?;
        let domain = domains::table
            .filter(domains::hostname.eq(hostname))
            .select(Domain::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(domain)
    }

    async fn recrawl_candidates(&self) -> Result<Vec<RecrawlCandidate>, StoreError> {
        let mut conn = self.pool.get().await?;

        let active: Vec<Domain> = domains::table
            .filter(domains::active.eq(true))
            .order(domains::hostname.asc())
            .select(Domain::as_select())
            .load(&mut conn)
            .await?;

        let ids: Vec<Uuid> = active.iter().map(|d| d.id).collect();

        // latest job per domain
        let latest: Vec<Job> = jobs::table
            .filter(jobs::domain_id.eq_any(&ids))
            .order((jobs::domain_id, jobs::started_at.desc()))
            .distinct_on(jobs::domain_id)
            .select(Job::as_select())
            .load(&mut conn)
            .await?;

        Ok(active
            .into_iter()
            .map(|domain| {
                let last_job = latest.iter().find(|j| j.domain_id == domain.id).cloned();
                RecrawlCandidate { domain, last_job }
            })
            .collect())
    }

    async fn has_finished_job(&self, domain_id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let finished: i64 = jobs::table
            .filter(jobs::domain_id.eq(domain_id))
            .filter(jobs::status.eq(JobStatus::Finished))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(finished > 0)
    }

    async fn create_job(&self, job: &Job) -> Result<Job, StoreError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(jobs::table)
            .values(job)
            .returning(Job::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| {
                if is_active_job_violation(&e) {
                    StoreError::ActiveJobExists(job.domain_id)
                } else {
                    StoreError::Db(e)
                }
            })
    }

    async fn count_active_jobs(&self) -> Result<i64, StoreError> {
        let mut conn = self.pool.get().await?;
        let n = jobs::table
            .filter(jobs::status.eq(JobStatus::Processing))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(n)
    }

    async fn set_external_job_id(&self, job_id: Uuid, external_job_id: &str) -> Result<Option<Job>, StoreError> {
        let mut conn = self.pool.get().await?;
        let job = diesel::update(jobs::table.find(job_id).filter(jobs::status.eq(JobStatus::Processing)))
            .set(jobs::external_job_id.eq(external_job_id))
            .returning(Job::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Job, StoreError> {
        let mut conn = self.pool.get().await?;
        jobs::table
            .find(job_id)
            .select(Job::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| StoreError::not_found("job", job_id))
    }

    async fn list_active_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let mut conn = self.pool.get().await?;
        let active = jobs::table
            .filter(jobs::status.eq(JobStatus::Processing))
            .order(jobs::started_at.asc())
            .select(Job::as_select())
            .load(&mut conn)
            .await?;
        Ok(active)
    }

    async fn record_delivery(&self, job_id: Uuid, url: &str) -> Result<DeliveryOutcome, StoreError> {
        let mut conn = self.pool.get().await?;
        let delivery = PageDelivery {
            job_id,
            url: url.to_string(),
            received_at: Utc::now(),
        };

        let outcome = conn
            .transaction::<_, StoreError, _>(|conn| {
                Box::pin(async move {
                    let inserted = diesel::insert_into(page_deliveries::table)
                        .values(&delivery)
                        .on_conflict_do_nothing()
                        .execute(conn)
                        .await?;
                    if inserted == 0 {
                        return Ok(DeliveryOutcome::Duplicate);
                    }

                    // Rolls back the delivery key when the job is no longer processing.
                    let job = diesel::update(jobs::table.find(job_id).filter(jobs::status.eq(JobStatus::Processing)))
                        .set(jobs::pages_received.eq(jobs::pages_received + 1))
                        .returning(Job::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?
                        .ok_or(StoreError::JobNotProcessing(job_id))?;

                    Ok(DeliveryOutcome::Accepted(job))
                })
            })
            .await;

        match outcome {
            Err(StoreError::JobNotProcessing(_)) => Ok(DeliveryOutcome::JobNotProcessing),
            other => other,
        }
    }

    async fn mark_stream_closed(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let mut conn = self.pool.get().await?;
        let closed = diesel::update(
            jobs::table
                .find(job_id)
                .filter(jobs::status.eq(JobStatus::Processing))
                .filter(jobs::stream_closed.eq(false)),
        )
        .set((jobs::stream_closed.eq(true), jobs::stream_closed_at.eq(Some(Utc::now()))))
        .returning(Job::as_returning())
        .get_result(&mut conn)
        .await
        .optional()?;

        if closed.is_some() {
            return Ok(closed);
        }

        // already closed by an earlier delivery of the same event
        let job = jobs::table
            .find(job_id)
            .filter(jobs::status.eq(JobStatus::Processing))
            .select(Job::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(job)
    }

    async fn try_claim_assembly(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let claimed = diesel::update(
            jobs::table
                .find(job_id)
                .filter(jobs::status.eq(JobStatus::Processing))
                .filter(jobs::assembly_claimed.eq(false))
                .filter(jobs::stream_closed.eq(true))
                .filter(jobs::pages_received.gt(0))
                .filter(jobs::pages_processed.eq(jobs::pages_received)),
        )
        .set(jobs::assembly_claimed.eq(true))
        .execute(&mut conn)
        .await?;
        Ok(claimed == 1)
    }

    async fn finish_job(&self, job_id: Uuid, stats: serde_json::Value) -> Result<Option<Job>, StoreError> {
        let mut conn = self.pool.get().await?;
        let job = diesel::update(
            jobs::table
                .find(job_id)
                .filter(jobs::status.eq(JobStatus::Processing))
                .filter(jobs::assembly_claimed.eq(true)),
        )
        .set((
            jobs::status.eq(JobStatus::Finished),
            jobs::finished_at.eq(Some(Utc::now())),
            jobs::stats.eq(jobs::stats.concat(stats)),
        ))
        .returning(Job::as_returning())
        .get_result(&mut conn)
        .await
        .optional()?;
        Ok(job)
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<Option<Job>, StoreError> {
        let mut conn = self.pool.get().await?;
        let job = diesel::update(jobs::table.find(job_id).filter(jobs::status.eq(JobStatus::Processing)))
            .set((
                jobs::status.eq(JobStatus::Failed),
                jobs::finished_at.eq(Some(Utc::now())),
                jobs::stats.eq(jobs::stats.concat(serde_json::json!({ "error": error }))),
            ))
            .returning(Job::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(job)
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let mut conn = self.pool.get().await?;
        let job = diesel::update(jobs::table.find(job_id).filter(jobs::status.eq(JobStatus::Processing)))
            .set((jobs::status.eq(JobStatus::Canceled), jobs::finished_at.eq(Some(Utc::now()))))
            .returning(Job::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(job)
    }

    async fn upsert_page(&self, domain_id: Uuid, url: &str) -> Result<Page, StoreError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(pages::table)
            .values(&Page::new(domain_id, url))
            .on_conflict((pages::domain_id, pages::url))
            .do_nothing()
            .execute(&mut conn)
            .await?;

        let page = pages::table
            .filter(pages::domain_id.eq(domain_id))
            .filter(pages::url.eq(url))
            .select(Page::as_select())
            .first(&mut conn)
            .await?;
        Ok(page)
    }

    async fn previous_version(&self, page_id: Uuid, job_id: Uuid) -> Result<Option<PageVersion>, StoreError> {
        let mut conn = self.pool.get().await?;
        let version = page_versions::table
            .filter(page_versions::page_id.eq(page_id))
            .filter(page_versions::job_id.ne(job_id))
            .order(page_versions::created_at.desc())
            .select(PageVersion::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(version)
    }

    async fn has_page_version(&self, page_id: Uuid, job_id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let found: i64 = page_versions::table
            .filter(page_versions::page_id.eq(page_id))
            .filter(page_versions::job_id.eq(job_id))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(found > 0)
    }

    async fn record_page_version(&self, version: &PageVersion) -> Result<VersionOutcome, StoreError> {
        let mut conn = self.pool.get().await?;
        let version = version.clone();
        let job_id = version.job_id;

        let outcome = conn
            .transaction::<_, StoreError, _>(|conn| {
                Box::pin(async move {
                    let inserted = diesel::insert_into(page_versions::table)
                        .values(&version)
                        .on_conflict((page_versions::page_id, page_versions::job_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;
                    if inserted == 0 {
                        return Ok(VersionOutcome::Duplicate);
                    }

                    let job = diesel::update(
                        jobs::table
                            .find(job_id)
                            .filter(jobs::status.eq(JobStatus::Processing))
                            .filter(jobs::pages_processed.lt(jobs::pages_received)),
                    )
                    .set(jobs::pages_processed.eq(jobs::pages_processed + 1))
                    .returning(Job::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?
                    .ok_or(StoreError::JobNotProcessing(job_id))?;

                    diesel::update(pages::table.find(version.page_id))
                        .set(pages::last_known_version.eq(Some(version.id)))
                        .execute(conn)
                        .await?;

                    Ok(VersionOutcome::Recorded(job))
                })
            })
            .await;

        match outcome {
            Err(StoreError::JobNotProcessing(_)) => Ok(VersionOutcome::JobNotProcessing),
            other => other,
        }
    }

    async fn versions_for_job(&self, job_id: Uuid, changed_only: bool) -> Result<Vec<JobPage>, StoreError> {
        let mut conn = self.pool.get().await?;
        let mut query = page_versions::table
            .inner_join(pages::table)
            .filter(page_versions::job_id.eq(job_id))
            .order(pages::url.asc())
            .select((PageVersion::as_select(), pages::url))
            .into_boxed();
        if changed_only {
            query = query.filter(page_versions::changed_enough.eq(true));
        }

        let rows: Vec<(PageVersion, String)> = query.load(&mut conn).await?;

        Ok(rows.into_iter().map(|(version, url)| JobPage { url, version }).collect())
    }

    async fn version_counts(&self, job_id: Uuid) -> Result<VersionCounts, StoreError> {
        let mut conn = self.pool.get().await?;
        let total: i64 = page_versions::table
            .filter(page_versions::job_id.eq(job_id))
            .count()
            .get_result(&mut conn)
            .await?;
        let changed: i64 = page_versions::table
            .filter(page_versions::job_id.eq(job_id))
            .filter(page_versions::changed_enough.eq(true))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(VersionCounts { total, changed })
    }

    async fn create_artifact(
        &self,
        job_id: Uuid,
        domain_id: Uuid,
        kind: ArtifactKind,
        blob_path: &str,
    ) -> Result<Artifact, StoreError> {
        let mut conn = self.pool.get().await?;
        let blob_path = blob_path.to_string();

        conn.transaction::<_, StoreError, _>(|conn| {
            Box::pin(async move {
                // the counter row hands out versions; concurrent assemblers serialize on it
                let version: i32 = diesel::insert_into(artifact_counters::table)
                    .values((
                        artifact_counters::domain_id.eq(domain_id),
                        artifact_counters::kind.eq(kind),
                        artifact_counters::last_version.eq(1),
                    ))
                    .on_conflict((artifact_counters::domain_id, artifact_counters::kind))
                    .do_update()
                    .set(artifact_counters::last_version.eq(artifact_counters::last_version + 1))
                    .returning(artifact_counters::last_version)
                    .get_result(conn)
                    .await?;

                let artifact = Artifact {
                    id: Uuid::new_v4(),
                    job_id,
                    domain_id,
                    kind,
                    blob_path,
                    version,
                    created_at: Utc::now(),
                };
                diesel::insert_into(artifacts::table)
                    .values(&artifact)
                    .execute(conn)
                    .await?;

                Ok(artifact)
            })
        })
        .await
    }

    async fn latest_artifact(&self, domain_id: Uuid, kind: ArtifactKind) -> Result<Option<Artifact>, StoreError> {
        let mut conn = self.pool.get().await?;
        let artifact = artifacts::table
            .filter(artifacts::domain_id.eq(domain_id))
            .filter(artifacts::kind.eq(kind))
            .order(artifacts::version.desc())
            .select(Artifact::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(artifact)
    }

    async fn artifacts_for_job(&self, job_id: Uuid) -> Result<Vec<Artifact>, StoreError> {
        let mut conn = self.pool.get().await?;
        let found = artifacts::table
            .filter(artifacts::job_id.eq(job_id))
            .order((artifacts::kind.asc(), artifacts::version.asc()))
            .select(Artifact::as_select())
            .load(&mut conn)
            .await?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobKind;
    use crate::test_helpers::{clean_test_db, seed_domain, seed_job, test_db_pool, test_page_version};
    use tokio::sync::Mutex;

    // Tests share one database; run them one at a time.
    static TEST_MUTEX: Mutex<()> = Mutex::const_new(());

    macro_rules! pg_store_or_skip {
        () => {{
            let Some(pool) = test_db_pool().await else {
                eprintln!("TEST_DATABASE_URL not set; skipping");
                return;
            };
            clean_test_db(&pool).await;
            PgStore::new(pool)
        }};
    }

    #[tokio::test]
    async fn test_partial_index_enforces_one_active_job() {
        let _guard = TEST_MUTEX.lock().await;
        let store = pg_store_or_skip!();
        let domain = seed_domain(&store, "example.com").await;
        let first = seed_job(&store, domain.id, JobKind::New, "ext-1").await;

        let err = store.create_job(&Job::new(domain.id, JobKind::New)).await.unwrap_err();
        assert!(matches!(err, StoreError::ActiveJobExists(_)));

        store.cancel_job(first.id).await.unwrap().unwrap();
        assert!(store.create_job(&Job::new(domain.id, JobKind::Update)).await.is_ok());
    }

    #[tokio::test]
    async fn test_delivery_and_version_counters() {
        let _guard = TEST_MUTEX.lock().await;
        let store = pg_store_or_skip!();
        let domain = seed_domain(&store, "example.com").await;
        let job = seed_job(&store, domain.id, JobKind::New, "ext-1").await;
        let page = store.upsert_page(domain.id, "https://example.com/").await.unwrap();

        assert!(matches!(
            store.record_delivery(job.id, &page.url).await.unwrap(),
            DeliveryOutcome::Accepted(_)
        ));
        assert_eq!(
            store.record_delivery(job.id, &page.url).await.unwrap(),
            DeliveryOutcome::Duplicate
        );

        let version = test_page_version(&page, job.id, "fp", true);
        assert!(!store.has_page_version(page.id, job.id).await.unwrap());
        assert!(matches!(
            store.record_page_version(&version).await.unwrap(),
            VersionOutcome::Recorded(ref j) if j.pages_processed == 1
        ));
        assert!(store.has_page_version(page.id, job.id).await.unwrap());
        assert_eq!(
            store.record_page_version(&version).await.unwrap(),
            VersionOutcome::Duplicate
        );

        store.mark_stream_closed(job.id).await.unwrap().unwrap();
        assert!(store.try_claim_assembly(job.id).await.unwrap());
        assert!(!store.try_claim_assembly(job.id).await.unwrap());

        let finished = store
            .finish_job(job.id, serde_json::json!({ "totalPagesProcessed": 1 }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(finished.status, JobStatus::Finished);
        assert_eq!(finished.stats["totalPagesProcessed"], 1);
    }

    #[tokio::test]
    async fn test_version_rolled_back_when_job_canceled() {
        let _guard = TEST_MUTEX.lock().await;
        let store = pg_store_or_skip!();
        let domain = seed_domain(&store, "example.com").await;
        let job = seed_job(&store, domain.id, JobKind::New, "ext-1").await;
        let page = store.upsert_page(domain.id, "https://example.com/").await.unwrap();
        store.record_delivery(job.id, &page.url).await.unwrap();
        store.cancel_job(job.id).await.unwrap();

        let outcome = store
            .record_page_version(&test_page_version(&page, job.id, "fp", true))
            .await
            .unwrap();
        assert_eq!(outcome, VersionOutcome::JobNotProcessing);
        assert_eq!(store.version_counts(job.id).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_artifact_versions_increment_per_kind() {
        let _guard = TEST_MUTEX.lock().await;
        let store = pg_store_or_skip!();
        let domain = seed_domain(&store, "example.com").await;
        let job = seed_job(&store, domain.id, JobKind::New, "ext-1").await;

        let a = store.create_artifact(job.id, domain.id, ArtifactKind::Index, "a").await.unwrap();
        let b = store.create_artifact(job.id, domain.id, ArtifactKind::Index, "b").await.unwrap();
        let c = store.create_artifact(job.id, domain.id, ArtifactKind::Full, "c").await.unwrap();
        assert_eq!((a.version, b.version, c.version), (1, 2, 1));

        let latest = store.latest_artifact(domain.id, ArtifactKind::Index).await.unwrap().unwrap();
        assert_eq!(latest.id, b.id);
        assert_eq!(store.artifacts_for_job(job.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fail_job_records_error() {
        let _guard = TEST_MUTEX.lock().await;
        let store = pg_store_or_skip!();
        let domain = seed_domain(&store, "example.com").await;
        let job = seed_job(&store, domain.id, JobKind::New, "ext-1").await;

        let failed = store.fail_job(job.id, "provider unreachable").await.unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.stats["error"], "provider unreachable");
        assert!(store.fail_job(job.id, "again").await.unwrap().is_none());
    }
}
