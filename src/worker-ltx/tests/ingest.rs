//! Tests for event validation and concurrent delivery.

mod common;

use std::sync::Arc;

use common::{article, completed, harness, page};
use core_ltx::blob::ObjectStore;
use data_model_ltx::models::{Job, JobKind, JobStatus};
use data_model_ltx::store::JobStore;
use data_model_ltx::test_helpers::test_page_version;
use worker_ltx::{Error, IngestOutcome};

#[tokio::test]
async fn test_event_from_another_crawl_is_rejected() {
    let h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    let mut foreign = page(&job, "https://example.com/a", "# A");
    foreign.external_job_id = "crawl-999".to_string();
    let err = h.pipeline.ingest_page(foreign).await.unwrap_err();

    assert!(matches!(
        err,
        Error::ExternalIdMismatch { ref expected, ref received, .. } if expected == "crawl-1" && received == "crawl-999"
    ));
    assert!(!err.is_retriable());
    assert_eq!(h.job(job.id).await.pages_received, 0);
    assert!(h.objects.paths().is_empty());
}

#[tokio::test]
async fn test_event_before_crawl_id_is_stored_is_retriable() {
    let h = harness();
    let domain = h.domain("example.com").await;
    // A job whose launch has not yet recorded the provider's id.
    let job = h.store.create_job(&Job::new(domain.id, JobKind::New)).await.unwrap();
    let with_id = Job {
        external_job_id: Some("crawl-early".to_string()),
        ..job.clone()
    };

    let err = h
        .pipeline
        .ingest_page(page(&with_id, "https://example.com/a", "# A"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExternalIdPending(id) if id == job.id));
    assert!(err.is_retriable());

    let err = h.pipeline.stream_closed(completed(&with_id, None)).await.unwrap_err();
    assert!(err.is_retriable());
    assert!(!h.job(job.id).await.stream_closed);
}

#[tokio::test]
async fn test_events_for_finished_job_are_ignored() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;
    let finished = h.crawl(&job, &[("https://example.com/a", "# A\n\nHello.")]).await;
    assert_eq!(finished.status, JobStatus::Finished);

    let outcome = h
        .pipeline
        .ingest_page(page(&job, "https://example.com/late", "# Late"))
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Ignored(JobStatus::Finished));

    let outcome = h.pipeline.stream_closed(completed(&job, None)).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Ignored(JobStatus::Finished));

    // Finalizing again changes nothing.
    assert!(h.pipeline.finalize(job.id, vec![]).await.unwrap().is_none());
    let after = h.job(job.id).await;
    assert_eq!(after, finished);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let h = harness();
    let domain = h.domain("example.com").await;
    let job = Job {
        external_job_id: Some("crawl-1".to_string()),
        ..Job::new(domain.id, JobKind::New)
    };

    let err = h
        .pipeline
        .ingest_page(page(&job, "https://example.com/a", "# A"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_delivery_assembles_exactly_once() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    let urls: Vec<String> = (0..40)
        .map(|i| format!("https://example.com/section{}/page{}", i % 4, i))
        .collect();

    // Every page delivered twice, concurrently, with the close racing the pages.
    let mut deliveries = Vec::new();
    for round in 0..2 {
        for url in &urls {
            let pipeline = Arc::clone(&h.pipeline);
            let event = page(&job, url, &article(url));
            deliveries.push(tokio::spawn(async move { pipeline.ingest_page(event).await }));
        }
        if round == 0 {
            let pipeline = Arc::clone(&h.pipeline);
            let event = completed(&job, None);
            deliveries.push(tokio::spawn(async move { pipeline.stream_closed(event).await }));
        }
    }
    for result in futures::future::join_all(deliveries).await {
        result.unwrap().unwrap();
    }
    h.dispatcher.drain().await;

    let finished = h.job(job.id).await;
    assert_eq!(finished.status, JobStatus::Finished);
    assert_eq!(finished.pages_received, 40);
    assert_eq!(finished.pages_processed, 40);
    assert_eq!(finished.stats["totalPagesProcessed"], 40);

    let artifacts = h.store.artifacts_for_job(job.id).await.unwrap();
    assert_eq!(artifacts.len(), 2, "assembly must run exactly once");
    assert!(artifacts.iter().all(|a| a.version == 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_completion_checks_have_one_winner() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    // Bring the job to "ready" directly through the store, without claiming it.
    let stored = h.store.upsert_page(domain.id, "https://example.com/a").await.unwrap();
    h.store.record_delivery(job.id, &stored.url).await.unwrap();
    let version = test_page_version(&stored, job.id, "fingerprint-a", true);
    h.objects.put(&version.processed_path, "# A\n\nHello.").await.unwrap();
    h.store.record_page_version(&version).await.unwrap();
    let ready = h.store.mark_stream_closed(job.id).await.unwrap().unwrap();
    assert!(ready.is_ready_for_assembly());

    let job_id = job.id;
    let checks = (0..16).map(|_| {
        let pipeline = Arc::clone(&h.pipeline);
        tokio::spawn(async move { pipeline.check_completion(job_id).await })
    });
    let winners = futures::future::join_all(checks)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(true))))
        .count();
    assert_eq!(winners, 1);

    h.dispatcher.drain().await;
    let finished = h.job(job_id).await;
    assert_eq!(finished.status, JobStatus::Finished);
    assert_eq!(h.store.artifacts_for_job(job_id).await.unwrap().len(), 2);
}
