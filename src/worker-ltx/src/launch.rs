//! Crawl Launcher: turns an ingest request into a processing job with a running crawl.

use std::time::Duration;

use core_ltx::{normalize_hostname, site_url};
use data_model_ltx::models::{Job, JobKind};
use uuid::Uuid;

use crate::{Error, Pipeline};

impl Pipeline {
    /// Starts a crawl of the domain.
    ///
    /// Refuses missing or inactive domains and domains that already have a
    /// processing job. When the provider cannot be reached after the configured
    /// retries, the job that was created is marked failed, which frees the
    /// domain for the next launch.
    pub async fn launch_crawl(&self, domain_id: Uuid, kind: JobKind) -> Result<Job, Error> {
        let domain = self.load_domain(domain_id).await?;
        if !domain.active {
            return Err(Error::DomainInactive(domain.hostname));
        }

        if let Some(limit) = self.config.max_active_jobs {
            let active = self.retry("count active jobs", || self.store.count_active_jobs()).await?;
            if active >= limit as i64 {
                return Err(Error::AtCapacity { active, limit });
            }
        }

        let _permit = self.launch_permits.acquire().await?;

        let new_job = Job::new(domain.id, kind);
        let job = self.retry("create job", || self.store.create_job(&new_job)).await?;
        tracing::info!("[job: {}] Created {:?} job for '{}'", job.id, job.kind, domain.hostname);

        let url = site_url(&domain.hostname);
        let freshness_hint = domain.recrawl_interval().to_std().unwrap_or(Duration::ZERO);
        let callback_target = self.config.callback_target(job.id);

        let external_job_id = match self
            .retry("start crawl", || self.crawler.start(&url, freshness_hint, &callback_target))
            .await
        {
            Ok(id) => id,
            Err(error) => {
                self.fail_job(job.id, &format!("Failed to start crawl: {}", error)).await;
                return Err(error);
            }
        };

        match self
            .retry("store crawl id", || self.store.set_external_job_id(job.id, &external_job_id))
            .await?
        {
            Some(job) => {
                tracing::info!("[job: {}] Crawl '{}' started for {}", job.id, external_job_id, url);
                Ok(job)
            }
            None => {
                tracing::info!(
                    "[job: {}] Left processing before crawl '{}' was recorded",
                    job.id,
                    external_job_id
                );
                Err(Error::JobNotProcessing(job.id))
            }
        }
    }

    /// Launches a crawl for a domain by hostname: an `update` when the domain has a
    /// finished job already, otherwise `new`.
    pub async fn recrawl(&self, hostname: &str) -> Result<Job, Error> {
        let hostname = normalize_hostname(hostname)?;
        let domain = self
            .retry("find domain", || self.store.find_domain_by_hostname(&hostname))
            .await?
            .ok_or_else(|| Error::UnknownHostname(hostname.clone()))?;

        let kind = if self.retry("check history", || self.store.has_finished_job(domain.id)).await? {
            JobKind::Update
        } else {
            JobKind::New
        };
        self.launch_crawl(domain.id, kind).await
    }
}
