//! End-to-end runs of the pipeline against in-memory collaborators.

mod common;

use std::sync::Arc;

use common::{article, completed, harness, harness_with, page, test_config};
use core_ltx::blob::{ObjectStore, raw_path};
use core_ltx::crawl::MockCrawlProvider;
use core_ltx::llms::Summarizer;
use core_ltx::llms::mock::MockSummarizer;
use data_model_ltx::models::{ArtifactKind, JobKind, JobStatus};
use data_model_ltx::store::JobStore;

#[tokio::test]
async fn test_out_of_order_events_finish_with_one_assembly() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    // The stream closes before any page shows up.
    h.pipeline.stream_closed(completed(&job, None)).await.unwrap();
    h.dispatcher.drain().await;
    let waiting = h.job(job.id).await;
    assert_eq!(waiting.status, JobStatus::Processing);
    assert!(waiting.stream_closed);
    assert!(!waiting.assembly_claimed);

    h.pipeline
        .ingest_page(page(&job, "https://example.com/docs/intro", &article("Intro")))
        .await
        .unwrap();
    h.pipeline
        .ingest_page(page(&job, "https://example.com/", &article("Home")))
        .await
        .unwrap();
    h.pipeline
        .ingest_page(page(&job, "https://example.com/blog/hello", &article("Hello")))
        .await
        .unwrap();
    h.dispatcher.drain().await;

    let finished = h.job(job.id).await;
    assert_eq!(finished.status, JobStatus::Finished);
    assert!(finished.finished_at.is_some());
    assert_eq!(finished.pages_received, 3);
    assert_eq!(finished.pages_processed, 3);
    assert_eq!(finished.stats["totalPagesProcessed"], 3);
    assert_eq!(finished.stats["changedPages"], 3);
    assert_eq!(finished.stats["unchangedPages"], 0);
    assert_eq!(finished.stats["artifactCount"], 2);
    assert!(finished.stats["durationMs"].as_i64().unwrap() >= 0);

    let artifacts = h.store.artifacts_for_job(job.id).await.unwrap();
    assert_eq!(artifacts.len(), 2);
    assert!(artifacts.iter().all(|a| a.version == 1));

    let index = h
        .store
        .latest_artifact(domain.id, ArtifactKind::Index)
        .await
        .unwrap()
        .unwrap();
    assert!(index.blob_path.starts_with("artifacts/example.com/"));
    assert!(index.blob_path.ends_with(&format!("/{}/llms.txt", job.id)));
    let llms_txt = h.objects.get(&index.blob_path).await.unwrap();
    assert!(llms_txt.starts_with("# example.com\n"));
    assert!(llms_txt.contains("## Blog"));
    assert!(llms_txt.contains("## Docs"));
    assert!(llms_txt.contains("[Intro](https://example.com/docs/intro): Summary of https://example.com/docs/intro"));

    let full = h
        .store
        .latest_artifact(domain.id, ArtifactKind::Full)
        .await
        .unwrap()
        .unwrap();
    let llms_full = h.objects.get(&full.blob_path).await.unwrap();
    assert!(llms_full.contains("## Table of Contents"));
    assert!(llms_full.contains("Hello sentence number 59 explains things."));
}

#[tokio::test]
async fn test_redelivered_pages_are_counted_once() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    for _ in 0..3 {
        h.pipeline
            .ingest_page(page(&job, "https://example.com/a", &article("A")))
            .await
            .unwrap();
    }
    // Fragments do not make a different page.
    let outcome = h
        .pipeline
        .ingest_page(page(&job, "https://example.com/a#section", &article("A")))
        .await
        .unwrap();
    assert_eq!(outcome, worker_ltx::IngestOutcome::Duplicate);

    h.pipeline.stream_closed(completed(&job, Some(1))).await.unwrap();
    // A second close is acknowledged without effect.
    let again = h.pipeline.stream_closed(completed(&job, Some(1))).await.unwrap();
    assert_ne!(again, worker_ltx::IngestOutcome::Accepted);
    h.dispatcher.drain().await;

    let finished = h.job(job.id).await;
    assert_eq!(finished.status, JobStatus::Finished);
    assert_eq!(finished.pages_received, 1);
    assert_eq!(finished.pages_processed, 1);
    assert_eq!(h.store.artifacts_for_job(job.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unchanged_recrawl_finishes_without_artifacts() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let pages = [
        ("https://example.com/a", article("Alpha")),
        ("https://example.com/b", article("Beta")),
    ];
    let pages: Vec<(&str, &str)> = pages.iter().map(|(u, c)| (*u, c.as_str())).collect();

    let first = h.launch(&domain, JobKind::New).await;
    let first = h.crawl(&first, &pages).await;
    assert_eq!(first.status, JobStatus::Finished);

    let second = h.launch(&domain, JobKind::Update).await;
    let second = h.crawl(&second, &pages).await;

    assert_eq!(second.status, JobStatus::Finished);
    assert_eq!(second.stats["changedPages"], 0);
    assert_eq!(second.stats["unchangedPages"], 2);
    assert_eq!(second.stats["artifactCount"], 0);
    assert!(h.store.artifacts_for_job(second.id).await.unwrap().is_empty());

    let versions = h.store.versions_for_job(second.id, false).await.unwrap();
    assert_eq!(versions.len(), 2);
    for v in &versions {
        assert!(!v.version.changed_enough);
        assert_eq!(v.version.similarity_score, 1.0);
        assert_eq!(v.version.reason, "identical");
        assert_eq!(v.version.prev_fingerprint.as_deref(), Some(v.version.fingerprint.as_str()));
    }

    // The published artifacts are still the first job's.
    let latest = h
        .store
        .latest_artifact(domain.id, ArtifactKind::Index)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.job_id, first.id);
    assert_eq!(latest.version, 1);
}

#[tokio::test]
async fn test_changed_page_publishes_next_artifact_version() {
    let mut h = harness();
    let domain = h.domain("example.com").await;

    let first = h.launch(&domain, JobKind::New).await;
    let alpha = article("Alpha");
    let beta = article("Beta");
    h.crawl(&first, &[("https://example.com/a", alpha.as_str()), ("https://example.com/b", beta.as_str())])
        .await;

    let rewritten: Vec<String> = (0..60)
        .map(|i| format!("Release {} shipped with fixes and improvements.", i))
        .collect();
    let rewritten = format!("# Alpha\n\n{}", rewritten.join(" "));
    // Whitespace-only noise on /b must not count as a change.
    let beta_noisy = beta.replace(". ", ".   ");
    let second = h.launch(&domain, JobKind::Update).await;
    let second = h
        .crawl(
            &second,
            &[("https://example.com/a", rewritten.as_str()), ("https://example.com/b", beta_noisy.as_str())],
        )
        .await;

    assert_eq!(second.status, JobStatus::Finished);
    assert_eq!(second.stats["changedPages"], 1);
    assert_eq!(second.stats["unchangedPages"], 1);

    let index = h
        .store
        .latest_artifact(domain.id, ArtifactKind::Index)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(index.job_id, second.id);
    assert_eq!(index.version, 2);

    let llms_txt = h.objects.get(&index.blob_path).await.unwrap();
    assert!(llms_txt.contains("https://example.com/a"));
    assert!(!llms_txt.contains("https://example.com/b"));

    let changed = h.store.versions_for_job(second.id, true).await.unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].version.reason, "changed");
    assert!(changed[0].version.similarity_score < test_config().similarity_threshold);
}

#[tokio::test]
async fn test_empty_crawl_is_failed() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    h.pipeline.stream_closed(completed(&job, Some(0))).await.unwrap();
    h.dispatcher.drain().await;

    let failed = h.job(job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.stats["error"], worker_ltx::EMPTY_CRAWL_REASON);
    assert!(h.store.artifacts_for_job(job.id).await.unwrap().is_empty());
    assert_eq!(h.store.count_active_jobs().await.unwrap(), 0);
}

#[tokio::test]
async fn test_close_without_count_waits_for_pages() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    h.pipeline.stream_closed(completed(&job, None)).await.unwrap();
    h.dispatcher.drain().await;

    let waiting = h.job(job.id).await;
    assert_eq!(waiting.status, JobStatus::Processing);
    assert!(!waiting.assembly_claimed);
    assert!(!waiting.is_ready_for_assembly());
}

#[tokio::test]
async fn test_cancel_stops_further_progress() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    h.pipeline
        .ingest_page(page(&job, "https://example.com/a", &article("A")))
        .await
        .unwrap();
    h.pipeline
        .ingest_page(page(&job, "https://example.com/b", &article("B")))
        .await
        .unwrap();

    let canceled = h.pipeline.cancel_job(job.id).await.unwrap().unwrap();
    assert_eq!(canceled.status, JobStatus::Canceled);
    assert!(h.pipeline.cancel_job(job.id).await.unwrap().is_none());

    // Queued processing runs after the cancellation and must not write anything.
    h.dispatcher.drain().await;
    let outcome = h.pipeline.stream_closed(completed(&job, None)).await.unwrap();
    assert_eq!(outcome, worker_ltx::IngestOutcome::Ignored(JobStatus::Canceled));
    let late = h
        .pipeline
        .ingest_page(page(&job, "https://example.com/c", &article("C")))
        .await
        .unwrap();
    assert_eq!(late, worker_ltx::IngestOutcome::Ignored(JobStatus::Canceled));

    let after = h.job(job.id).await;
    assert_eq!(after.status, JobStatus::Canceled);
    assert_eq!(after.pages_received, 2);
    assert_eq!(after.pages_processed, 0);
    assert!(h.store.versions_for_job(job.id, false).await.unwrap().is_empty());
    assert!(h.store.artifacts_for_job(job.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_summarizer_failure_degrades_to_empty_summary() {
    let summarizer = Arc::new(MockSummarizer::with_failure());
    let mut h = harness_with(MockCrawlProvider::new(), Some(summarizer.clone() as Arc<dyn Summarizer>), test_config());
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    let finished = h
        .crawl(&job, &[("https://example.com/a", "# Alpha\n\nThe first letter.")])
        .await;

    assert_eq!(finished.status, JobStatus::Finished);
    assert_eq!(summarizer.calls(), 1);
    let versions = h.store.versions_for_job(job.id, true).await.unwrap();
    assert_eq!(versions[0].version.summary, None);
    assert_eq!(versions[0].version.title.as_deref(), Some("Alpha"));
    assert_eq!(versions[0].version.description.as_deref(), Some("The first letter."));

    let index = h
        .store
        .latest_artifact(domain.id, ArtifactKind::Index)
        .await
        .unwrap()
        .unwrap();
    let llms_txt = h.objects.get(&index.blob_path).await.unwrap();
    assert!(llms_txt.contains("- [Alpha](https://example.com/a): The first letter."));
}

#[tokio::test]
async fn test_transient_summarizer_outage_is_retried() {
    let summarizer = Arc::new(MockSummarizer::unavailable_for(1));
    let mut h = harness_with(MockCrawlProvider::new(), Some(summarizer.clone() as Arc<dyn Summarizer>), test_config());
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    let finished = h
        .crawl(&job, &[("https://example.com/a", "# Alpha\n\nThe first letter.")])
        .await;

    assert_eq!(finished.status, JobStatus::Finished);
    assert_eq!(summarizer.calls(), 2);
    let versions = h.store.versions_for_job(job.id, true).await.unwrap();
    assert_eq!(versions[0].version.summary.as_deref(), Some("Summary of https://example.com/a"));
}

#[tokio::test]
async fn test_summarizer_outage_past_retry_budget_degrades_to_empty_summary() {
    let summarizer = Arc::new(MockSummarizer::unavailable_for(usize::MAX));
    let mut h = harness_with(MockCrawlProvider::new(), Some(summarizer.clone() as Arc<dyn Summarizer>), test_config());
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    let finished = h
        .crawl(&job, &[("https://example.com/a", "# Alpha\n\nThe first letter.")])
        .await;

    assert_eq!(finished.status, JobStatus::Finished);
    assert_eq!(summarizer.calls(), 3);
    let versions = h.store.versions_for_job(job.id, true).await.unwrap();
    assert_eq!(versions[0].version.summary, None);
}

#[tokio::test]
async fn test_unchanged_pages_are_not_summarized() {
    let summarizer = Arc::new(MockSummarizer::new());
    let mut h = harness_with(MockCrawlProvider::new(), Some(summarizer.clone() as Arc<dyn Summarizer>), test_config());
    let domain = h.domain("example.com").await;
    let content = article("Alpha");

    let first = h.launch(&domain, JobKind::New).await;
    h.crawl(&first, &[("https://example.com/a", content.as_str())]).await;
    let second = h.launch(&domain, JobKind::Update).await;
    h.crawl(&second, &[("https://example.com/a", content.as_str())]).await;

    assert_eq!(summarizer.calls(), 1);
}

#[tokio::test]
async fn test_crawl_failed_event_fails_job() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    h.pipeline
        .crawl_failed(worker_ltx::CrawlFailed {
            job_id: job.id,
            external_job_id: job.external_job_id.clone().unwrap(),
            error: "robots.txt disallows crawling".to_string(),
        })
        .await
        .unwrap();
    h.dispatcher.drain().await;

    let failed = h.job(job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.stats["error"], "Crawl failed: robots.txt disallows crawling");
}

#[tokio::test]
async fn test_redelivery_recovers_page_whose_raw_content_was_lost() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    h.pipeline
        .ingest_page(page(&job, "https://example.com/a", &article("A")))
        .await
        .unwrap();
    for path in h.objects.paths() {
        h.objects.remove(&path);
    }
    h.pipeline.stream_closed(completed(&job, None)).await.unwrap();
    h.dispatcher.drain().await;

    let stuck = h.job(job.id).await;
    assert_eq!(stuck.status, JobStatus::Processing);
    assert_eq!(stuck.pages_received, 1);
    assert_eq!(stuck.pages_processed, 0);
    assert!(!stuck.assembly_claimed);

    // The provider retries the page: still a duplicate, but it gets processed this time.
    let outcome = h
        .pipeline
        .ingest_page(page(&job, "https://example.com/a", &article("A")))
        .await
        .unwrap();
    assert_eq!(outcome, worker_ltx::IngestOutcome::Duplicate);
    h.dispatcher.drain().await;

    let finished = h.job(job.id).await;
    assert_eq!(finished.status, JobStatus::Finished);
    assert_eq!(finished.pages_received, 1);
    assert_eq!(finished.pages_processed, 1);
    assert_eq!(h.store.artifacts_for_job(job.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_redelivery_does_not_replace_first_content() {
    let mut h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;

    h.pipeline
        .ingest_page(page(&job, "https://example.com/a", "# First\n\nOriginal body."))
        .await
        .unwrap();
    h.pipeline
        .ingest_page(page(&job, "https://example.com/a", "# Second\n\nChanged body."))
        .await
        .unwrap();
    h.pipeline.stream_closed(completed(&job, Some(1))).await.unwrap();
    h.dispatcher.drain().await;

    let finished = h.job(job.id).await;
    assert_eq!(finished.status, JobStatus::Finished);
    assert_eq!(finished.pages_processed, 1);
    let versions = h.store.versions_for_job(job.id, false).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version.title.as_deref(), Some("First"));
    let raw = h.objects.get(&raw_path("example.com", job.id, "https://example.com/a")).await.unwrap();
    assert_eq!(raw, "# First\n\nOriginal body.");
}

#[tokio::test]
async fn test_background_dispatcher_runs_job_to_completion() {
    let h = harness();
    let domain = h.domain("example.com").await;
    let job = h.launch(&domain, JobKind::New).await;
    let common::Harness {
        pipeline,
        dispatcher,
        store,
        ..
    } = h;
    let runner = tokio::spawn(dispatcher.run());

    pipeline
        .ingest_page(page(&job, "https://example.com/a", &article("A")))
        .await
        .unwrap();
    pipeline.stream_closed(completed(&job, Some(1))).await.unwrap();

    let mut status = JobStatus::Processing;
    for _ in 0..200 {
        status = store.get_job(job.id).await.unwrap().status;
        if status != JobStatus::Processing {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(status, JobStatus::Finished);
    runner.abort();
}
