//! Test utilities for the store.
//!
//! Seeding helpers work against any [`JobStore`]. The Postgres helpers connect to
//! the database named by `TEST_DATABASE_URL` and return `None` when it is unset,
//! so that database-backed tests skip cleanly on machines without Postgres.

use chrono::Utc;
use diesel::ExpressionMethods;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::{DbPool, establish_connection_pool};
use crate::models::{Domain, Job, JobKind, Page, PageVersion};
use crate::schema;
use crate::store::JobStore;

// =============================================================================
// Seeding
// =============================================================================

/// Insert an active domain with default settings.
pub async fn seed_domain(store: &dyn JobStore, hostname: &str) -> Domain {
    let domain = Domain::new(hostname);
    store.insert_domain(&domain).await.expect("Failed to insert test domain");
    domain
}

/// Insert an inactive domain.
pub async fn seed_inactive_domain(store: &dyn JobStore, hostname: &str) -> Domain {
    let domain = Domain {
        active: false,
        ..Domain::new(hostname)
    };
    store.insert_domain(&domain).await.expect("Failed to insert test domain");
    domain
}

/// Insert a processing job that already carries a provider id.
pub async fn seed_job(store: &dyn JobStore, domain_id: Uuid, kind: JobKind, external_job_id: &str) -> Job {
    let job = store
        .create_job(&Job::new(domain_id, kind))
        .await
        .expect("Failed to insert test job");
    store
        .set_external_job_id(job.id, external_job_id)
        .await
        .expect("Failed to set external job id")
        .expect("Test job is not processing")
}

/// A page version with placeholder blob paths.
pub fn test_page_version(page: &Page, job_id: Uuid, fingerprint: &str, changed_enough: bool) -> PageVersion {
    PageVersion {
        id: Uuid::new_v4(),
        page_id: page.id,
        job_id,
        raw_path: format!("raw/{}/{}", job_id, page.id),
        processed_path: format!("processed/{}/{}", job_id, page.id),
        fingerprint: fingerprint.to_string(),
        prev_fingerprint: None,
        similarity_score: if changed_enough { 0.0 } else { 1.0 },
        changed_enough,
        reason: if changed_enough { "new".to_string() } else { "identical".to_string() },
        title: None,
        description: None,
        summary: None,
        created_at: Utc::now(),
    }
}

// =============================================================================
// Database Test Helpers
// =============================================================================

/// Get a connection pool for the test database, or `None` when `TEST_DATABASE_URL` is unset.
pub async fn test_db_pool() -> Option<DbPool> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = establish_connection_pool(&database_url, 4)
        .await
        .expect("Failed to create test database pool - is the test database running?");
    Some(pool)
}

/// Clean all data from the test database, children before parents.
pub async fn clean_test_db(pool: &DbPool) {
    let mut conn = pool.get().await.expect("Failed to get database connection");

    diesel::update(schema::pages::table)
        .set(schema::pages::last_known_version.eq(None::<Uuid>))
        .execute(&mut conn)
        .await
        .expect("Failed to detach page versions");

    diesel::delete(schema::artifacts::table)
        .execute(&mut conn)
        .await
        .expect("Failed to clean artifacts table");
    diesel::delete(schema::artifact_counters::table)
        .execute(&mut conn)
        .await
        .expect("Failed to clean artifact_counters table");
    diesel::delete(schema::page_versions::table)
        .execute(&mut conn)
        .await
        .expect("Failed to clean page_versions table");
    diesel::delete(schema::pages::table)
        .execute(&mut conn)
        .await
        .expect("Failed to clean pages table");
    diesel::delete(schema::page_deliveries::table)
        .execute(&mut conn)
        .await
        .expect("Failed to clean page_deliveries table");
    diesel::delete(schema::jobs::table)
        .execute(&mut conn)
        .await
        .expect("Failed to clean jobs table");
    diesel::delete(schema::domains::table)
        .execute(&mut conn)
        .await
        .expect("Failed to clean domains table");
}
