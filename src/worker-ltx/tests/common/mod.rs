//! Shared fixtures: a pipeline wired to in-memory collaborators.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use core_ltx::blob::MemoryObjectStore;
use core_ltx::crawl::{MockCrawlProvider, PageMetadata};
use core_ltx::llms::Summarizer;
use core_ltx::llms::mock::MockSummarizer;
use core_ltx::retry::RetryPolicy;
use data_model_ltx::models::{Domain, Job, JobKind};
use data_model_ltx::store::{JobStore, MemoryStore};
use data_model_ltx::test_helpers::seed_domain;
use worker_ltx::{Collaborators, CrawlCompleted, CrawlPage, Dispatcher, Pipeline, PipelineConfig};

pub struct Harness {
    pub pipeline: Arc<Pipeline>,
    pub dispatcher: Dispatcher,
    pub store: Arc<MemoryStore>,
    pub objects: Arc<MemoryObjectStore>,
    pub crawler: Arc<MockCrawlProvider>,
}

/// No waiting between attempts.
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        },
        public_base_url: "https://ltx.test".to_string(),
        summarize_pages: true,
        ..PipelineConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(MockCrawlProvider::new(), Some(Arc::new(MockSummarizer::new())), test_config())
}

pub fn harness_with(
    crawler: MockCrawlProvider,
    summarizer: Option<Arc<dyn Summarizer>>,
    config: PipelineConfig,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let crawler = Arc::new(crawler);
    let (pipeline, dispatcher) = Pipeline::build(
        Collaborators {
            store: store.clone(),
            objects: objects.clone(),
            crawler: crawler.clone(),
            summarizer,
        },
        config,
    );
    Harness {
        pipeline,
        dispatcher,
        store,
        objects,
        crawler,
    }
}

impl Harness {
    pub async fn domain(&self, hostname: &str) -> Domain {
        seed_domain(self.store.as_ref(), hostname).await
    }

    pub async fn launch(&self, domain: &Domain, kind: JobKind) -> Job {
        self.pipeline
            .launch_crawl(domain.id, kind)
            .await
            .expect("launch should succeed")
    }

    pub async fn job(&self, job_id: uuid::Uuid) -> Job {
        self.store.get_job(job_id).await.expect("job should exist")
    }

    /// Delivers every page, closes the stream and runs the pipeline to idle.
    pub async fn crawl(&mut self, job: &Job, pages: &[(&str, &str)]) -> Job {
        for (url, content) in pages {
            self.pipeline
                .ingest_page(page(job, url, content))
                .await
                .expect("page should be accepted");
        }
        self.pipeline
            .stream_closed(completed(job, None))
            .await
            .expect("stream close should be accepted");
        self.dispatcher.drain().await;
        self.job(job.id).await
    }
}

pub fn page(job: &Job, url: &str, content: &str) -> CrawlPage {
    CrawlPage {
        job_id: job.id,
        external_job_id: job.external_job_id.clone().expect("job has a crawl id"),
        url: url.to_string(),
        content: content.to_string(),
        metadata: PageMetadata {
            source_url: Some(url.to_string()),
            ..PageMetadata::default()
        },
    }
}

pub fn completed(job: &Job, total: Option<u64>) -> CrawlCompleted {
    CrawlCompleted {
        job_id: job.id,
        external_job_id: job.external_job_id.clone().expect("job has a crawl id"),
        total,
    }
}

/// A page body long enough for shingle similarity to be meaningful.
pub fn article(topic: &str) -> String {
    let body: Vec<String> = (0..60).map(|i| format!("{} sentence number {} explains things.", topic, i)).collect();
    format!("# {}\n\n{}", topic, body.join(" "))
}
