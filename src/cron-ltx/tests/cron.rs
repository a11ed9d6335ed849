use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use cron_ltx::{Error, Recrawler, SweepConfig, schedule_recrawls, sweep_stale_jobs};
use data_model_ltx::models::{EMPTY_CRAWL_REASON, JobKind, JobStatus};
use data_model_ltx::store::{JobStore, MemoryStore};
use data_model_ltx::test_helpers::{seed_domain, seed_inactive_domain, seed_job};
use uuid::Uuid;

/// Records requested hostnames; hostnames in `busy` answer with a conflict.
#[derive(Default)]
struct RecordingRecrawler {
    requested: Mutex<Vec<String>>,
    busy: Vec<String>,
}

#[async_trait]
impl Recrawler for RecordingRecrawler {
    async fn recrawl(&self, hostname: &str) -> Result<Uuid, Error> {
        self.requested.lock().unwrap().push(hostname.to_string());
        if self.busy.iter().any(|h| h == hostname) {
            return Err(Error::JobInProgress);
        }
        Ok(Uuid::new_v4())
    }
}

fn sweep_config() -> SweepConfig {
    SweepConfig {
        empty_crawl_grace: std::time::Duration::from_secs(60),
        job_timeout: std::time::Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn test_schedules_only_due_domains() {
    let store = MemoryStore::new();
    seed_domain(&store, "never-crawled.example.com").await;
    seed_inactive_domain(&store, "inactive.example.com").await;

    let crawling = seed_domain(&store, "crawling.example.com").await;
    seed_job(&store, crawling.id, JobKind::New, "crawl-1").await;

    let recent = seed_domain(&store, "recent.example.com").await;
    let job = seed_job(&store, recent.id, JobKind::New, "crawl-2").await;
    assert!(store.try_claim_assembly(job.id).await.unwrap());
    let finished = store.finish_job(job.id, serde_json::json!({})).await.unwrap().unwrap();
    assert_eq!(finished.status, JobStatus::Finished);

    let recrawler = Arc::new(RecordingRecrawler::default());
    let dyn_recrawler: Arc<dyn Recrawler> = recrawler.clone();

    let started = schedule_recrawls(&store, &dyn_recrawler, Utc::now()).await.unwrap();
    assert_eq!(started, 1);
    assert_eq!(*recrawler.requested.lock().unwrap(), vec!["never-crawled.example.com"]);

    // A day later the finished domain is due as well.
    recrawler.requested.lock().unwrap().clear();
    let started = schedule_recrawls(&store, &dyn_recrawler, Utc::now() + Duration::days(2))
        .await
        .unwrap();
    assert_eq!(started, 2);
    assert_eq!(
        *recrawler.requested.lock().unwrap(),
        vec!["never-crawled.example.com", "recent.example.com"]
    );
}

#[tokio::test]
async fn test_conflicts_are_not_counted() {
    let store = MemoryStore::new();
    seed_domain(&store, "a.example.com").await;
    seed_domain(&store, "b.example.com").await;

    let recrawler: Arc<dyn Recrawler> = Arc::new(RecordingRecrawler {
        busy: vec!["a.example.com".to_string()],
        ..RecordingRecrawler::default()
    });
    let started = schedule_recrawls(&store, &recrawler, Utc::now()).await.unwrap();
    assert_eq!(started, 1);
}

#[tokio::test]
async fn test_sweep_fails_empty_and_timed_out_jobs() {
    let store = MemoryStore::new();

    let empty_domain = seed_domain(&store, "empty.example.com").await;
    let empty = seed_job(&store, empty_domain.id, JobKind::New, "crawl-1").await;
    store.mark_stream_closed(empty.id).await.unwrap();

    let busy_domain = seed_domain(&store, "busy.example.com").await;
    let busy = seed_job(&store, busy_domain.id, JobKind::New, "crawl-2").await;

    // Nothing is stale yet.
    let failed = sweep_stale_jobs(&store, &sweep_config(), Utc::now()).await.unwrap();
    assert!(failed.is_empty());

    // Past the grace period only the empty crawl is failed.
    let failed = sweep_stale_jobs(&store, &sweep_config(), Utc::now() + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(failed, vec![empty.id]);
    let empty = store.get_job(empty.id).await.unwrap();
    assert_eq!(empty.status, JobStatus::Failed);
    assert_eq!(empty.stats["error"], EMPTY_CRAWL_REASON);
    assert_eq!(store.get_job(busy.id).await.unwrap().status, JobStatus::Processing);

    // Past the timeout the other job goes too; the failed one is not touched again.
    let failed = sweep_stale_jobs(&store, &sweep_config(), Utc::now() + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(failed, vec![busy.id]);
    let busy = store.get_job(busy.id).await.unwrap();
    assert_eq!(busy.status, JobStatus::Failed);
    assert!(busy.stats["error"].as_str().unwrap().contains("timed out"));
}
