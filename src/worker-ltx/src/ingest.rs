//! Page Ingestion Handler: the entry point for everything the crawl provider reports.
//!
//! Pages arrive in any order and may be delivered more than once. A delivery is
//! counted the first time its (job, url) key is seen while the job is processing;
//! every other delivery is acknowledged without side effects on the job. A redelivery
//! of a page that never produced a version is queued for processing again, so a lost
//! raw blob or a dropped processing event heals on the provider's next retry.

use core_ltx::blob::raw_path;
use core_ltx::crawl::PageMetadata;
use core_ltx::normalize_page_url;
use data_model_ltx::models::{Job, JobStatus};
use data_model_ltx::store::DeliveryOutcome;
use uuid::Uuid;

use crate::completion::EMPTY_CRAWL_REASON;
use crate::events::{Event, ProcessPage};
use crate::{Error, Pipeline};

/// One crawled page reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlPage {
    pub job_id: Uuid,
    pub external_job_id: String,
    pub url: String,
    pub content: String,
    pub metadata: PageMetadata,
}

/// The provider finished crawling; no further pages will be reported.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlCompleted {
    pub job_id: Uuid,
    pub external_job_id: String,
    /// Number of pages the provider says it crawled, if it reports one.
    pub total: Option<u64>,
}

/// The provider gave up on the crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlFailed {
    pub job_id: Uuid,
    pub external_job_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The event changed the job.
    Accepted,
    /// Already seen. Nothing changed.
    Duplicate,
    /// The job is no longer processing. Nothing changed.
    Ignored(JobStatus),
}

impl Pipeline {
    /// Loads the job an event refers to. `Ok(Err(status))` when it has left processing.
    async fn job_for_event(&self, job_id: Uuid, external_job_id: &str) -> Result<Result<Job, JobStatus>, Error> {
        let job = self.load_job(job_id).await?;
        if job.status != JobStatus::Processing {
            tracing::debug!("[job: {}] Ignoring event, job is {}", job_id, job.status);
            return Ok(Err(job.status));
        }
        match job.external_job_id.as_deref() {
            None => Err(Error::ExternalIdPending(job_id)),
            Some(expected) if expected != external_job_id => {
                tracing::warn!(
                    "[job: {}] Rejecting event from crawl '{}', job belongs to crawl '{}'",
                    job_id,
                    external_job_id,
                    expected
                );
                Err(Error::ExternalIdMismatch {
                    job_id,
                    expected: expected.to_string(),
                    received: external_job_id.to_string(),
                })
            }
            Some(_) => Ok(Ok(job)),
        }
    }

    /// Accepts one crawled page: stores its raw content, counts it once, and queues it for processing.
    pub async fn ingest_page(&self, page: CrawlPage) -> Result<IngestOutcome, Error> {
        let job = match self.job_for_event(page.job_id, &page.external_job_id).await? {
            Ok(job) => job,
            Err(status) => return Ok(IngestOutcome::Ignored(status)),
        };
        let domain = self.load_domain(job.domain_id).await?;
        let url = normalize_page_url(&page.url);

        // Raw content goes in first so a counted page always has something to process.
        // The first delivery's content is the one that gets processed.
        let raw_path = raw_path(&domain.hostname, job.id, &url);
        self.retry("store raw page", || self.objects.put_if_absent(&raw_path, &page.content))
            .await?;

        let stored_page = self
            .retry("upsert page", || self.store.upsert_page(domain.id, &url))
            .await?;

        match self.retry("record delivery", || self.store.record_delivery(job.id, &url)).await? {
            DeliveryOutcome::Accepted(updated) => {
                tracing::debug!(
                    "[job: {}] Received page {} ({} received)",
                    job.id,
                    url,
                    updated.pages_received
                );
                self.publish(Event::ProcessPage(ProcessPage {
                    job_id: job.id,
                    page_id: stored_page.id,
                    url,
                    raw_path,
                    metadata: page.metadata,
                }));
                Ok(IngestOutcome::Accepted)
            }
            DeliveryOutcome::Duplicate => {
                let processed = self
                    .retry("check page version", || self.store.has_page_version(stored_page.id, job.id))
                    .await?;
                if processed {
                    tracing::debug!("[job: {}] Duplicate delivery of {}", job.id, url);
                } else {
                    tracing::info!("[job: {}] Redelivered {} has no version yet, queueing it again", job.id, url);
                    self.publish(Event::ProcessPage(ProcessPage {
                        job_id: job.id,
                        page_id: stored_page.id,
                        url,
                        raw_path,
                        metadata: page.metadata,
                    }));
                }
                Ok(IngestOutcome::Duplicate)
            }
            DeliveryOutcome::JobNotProcessing => Ok(IngestOutcome::Ignored(self.load_job(job.id).await?.status)),
        }
    }

    /// Records that the provider will send no more pages and re-checks completion.
    ///
    /// A crawl that reports zero pages on completion, before any page arrived, is failed
    /// right away. When no count is reported the job waits for in-flight pages.
    pub async fn stream_closed(&self, event: CrawlCompleted) -> Result<IngestOutcome, Error> {
        let job = match self.job_for_event(event.job_id, &event.external_job_id).await? {
            Ok(job) => job,
            Err(status) => return Ok(IngestOutcome::Ignored(status)),
        };

        if event.total == Some(0) && job.pages_received == 0 {
            return match self.fail_job(job.id, EMPTY_CRAWL_REASON).await {
                Some(_) => Ok(IngestOutcome::Accepted),
                None => Ok(IngestOutcome::Ignored(self.load_job(job.id).await?.status)),
            };
        }

        let Some(closed) = self.retry("close stream", || self.store.mark_stream_closed(job.id)).await? else {
            return Ok(IngestOutcome::Ignored(self.load_job(job.id).await?.status));
        };
        if !job.stream_closed {
            tracing::info!(
                "[job: {}] Crawl stream closed with {} pages received, {} processed",
                job.id,
                closed.pages_received,
                closed.pages_processed
            );
        }

        self.check_completion(job.id).await?;
        Ok(if job.stream_closed {
            IngestOutcome::Duplicate
        } else {
            IngestOutcome::Accepted
        })
    }

    /// Fails the job with the provider's error text.
    pub async fn crawl_failed(&self, event: CrawlFailed) -> Result<IngestOutcome, Error> {
        let job = match self.job_for_event(event.job_id, &event.external_job_id).await? {
            Ok(job) => job,
            Err(status) => return Ok(IngestOutcome::Ignored(status)),
        };
        let reason = format!("Crawl failed: {}", event.error);
        match self.fail_job(job.id, &reason).await {
            Some(_) => Ok(IngestOutcome::Accepted),
            None => Ok(IngestOutcome::Ignored(self.load_job(job.id).await?.status)),
        }
    }
}
