//! Content Processor: turns one accepted page into an immutable page version.

use chrono::Utc;
use core_ltx::blob::processed_path;
use core_ltx::content::clean_page;
use core_ltx::diff::{PreviousContent, Verdict, evaluate};
use core_ltx::llms::{PromptConfig, Summary};
use data_model_ltx::models::{Domain, JobStatus, PageVersion};
use data_model_ltx::store::VersionOutcome;
use uuid::Uuid;

use crate::events::{Event, ProcessPage};
use crate::{Error, Pipeline};

impl Pipeline {
    /// Cleans the page, compares it with the page's previous version and records the
    /// result. The version only commits while the job is still processing.
    /// Returns the recorded version, or `None` when nothing was written.
    pub async fn process_page(&self, request: ProcessPage) -> Result<Option<PageVersion>, Error> {
        let job = self.load_job(request.job_id).await?;
        if job.status != JobStatus::Processing {
            tracing::debug!("[job: {}] Skipping {}, job is {}", job.id, request.url, job.status);
            return Ok(None);
        }
        let domain = self.load_domain(job.domain_id).await?;

        let raw = self
            .retry("load raw page", || self.objects.get(&request.raw_path))
            .await?;
        let cleaned = clean_page(
            &raw,
            request.metadata.title.as_deref(),
            request.metadata.description.as_deref(),
        );

        let processed_path = processed_path(&domain.hostname, job.id, &request.url);
        self.retry("store processed page", || self.objects.put(&processed_path, &cleaned.markdown))
            .await?;

        let previous = self.previous_content(request.page_id, job.id).await?;
        let verdict = evaluate(&cleaned.markdown, previous.as_ref(), self.config.similarity_threshold);
        tracing::debug!(
            "[job: {}] {}: {} (similarity {:.3})",
            job.id,
            request.url,
            verdict.reason,
            verdict.similarity
        );

        let summary = if verdict.changed_enough {
            self.summarize(&domain, &request.url, &cleaned.markdown).await
        } else {
            Summary::default()
        };

        let version = page_version(&request, processed_path, verdict, cleaned.title, cleaned.description, summary);

        match self
            .retry("record page version", || self.store.record_page_version(&version))
            .await?
        {
            VersionOutcome::Recorded(updated) => {
                tracing::debug!(
                    "[job: {}] Processed {} ({}/{})",
                    job.id,
                    request.url,
                    updated.pages_processed,
                    updated.pages_received
                );
                self.publish(Event::PageProcessed {
                    job_id: job.id,
                    page_id: request.page_id,
                    changed: version.changed_enough,
                });
                self.check_completion(job.id).await?;
                Ok(Some(version))
            }
            VersionOutcome::Duplicate => {
                tracing::debug!("[job: {}] {} was already processed", job.id, request.url);
                self.check_completion(job.id).await?;
                Ok(None)
            }
            VersionOutcome::JobNotProcessing => {
                tracing::debug!("[job: {}] Dropped version of {}, job left processing", job.id, request.url);
                Ok(None)
            }
        }
    }

    /// The page's last version from an earlier job, with its processed text when it can still be read.
    async fn previous_content(&self, page_id: Uuid, job_id: Uuid) -> Result<Option<PreviousContent>, Error> {
        let Some(previous) = self
            .retry("load previous version", || self.store.previous_version(page_id, job_id))
            .await?
        else {
            return Ok(None);
        };

        let content = match self
            .retry("load previous content", || self.objects.get(&previous.processed_path))
            .await
        {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(
                    "[job: {}] Previous content at {} unavailable, treating page as changed: {}",
                    job_id,
                    previous.processed_path,
                    e
                );
                None
            }
        };
        Ok(Some(PreviousContent {
            fingerprint: previous.fingerprint,
            content,
        }))
    }

    /// Best effort. Transient failures are retried; anything left over yields an empty summary.
    async fn summarize(&self, domain: &Domain, url: &str, text: &str) -> Summary {
        let Some(summarizer) = &self.summarizer else {
            return Summary::default();
        };
        let config = PromptConfig {
            model: domain.model.clone(),
            instructions: domain.prompt.clone(),
            url: url.to_string(),
        };
        match self.retry("summarize page", || summarizer.summarize(text, &config)).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("Summarizing {} failed, continuing without a summary: {}", url, e);
                Summary::default()
            }
        }
    }
}

fn page_version(
    request: &ProcessPage,
    processed_path: String,
    verdict: Verdict,
    title: Option<String>,
    description: Option<String>,
    summary: Summary,
) -> PageVersion {
    let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };
    PageVersion {
        id: Uuid::new_v4(),
        page_id: request.page_id,
        job_id: request.job_id,
        raw_path: request.raw_path.clone(),
        processed_path,
        fingerprint: verdict.fingerprint,
        prev_fingerprint: verdict.prev_fingerprint,
        similarity_score: verdict.similarity,
        changed_enough: verdict.changed_enough,
        reason: verdict.reason.to_string(),
        title,
        description: description.or_else(|| non_empty(summary.description)),
        summary: non_empty(summary.summary),
        created_at: Utc::now(),
    }
}
