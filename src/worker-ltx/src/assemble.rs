//! Artifact Assembler: builds the job's `llms.txt` and `llms-full.txt` from its changed pages.

use chrono::Utc;
use core_ltx::artifacts::{ArtifactPage, render_full, render_index};
use data_model_ltx::models::{ArtifactKind, JobPage, JobStatus};
use uuid::Uuid;

use crate::events::Event;
use crate::{Error, Pipeline};

impl Pipeline {
    /// Writes one document per [`ArtifactKind`] and records an artifact for each.
    /// A job without changed pages produces no artifacts. Either way, finalization is requested.
    ///
    /// Only the winner of the assembly claim calls this.
    pub async fn assemble(&self, job_id: Uuid) -> Result<Vec<Uuid>, Error> {
        let job = self.load_job(job_id).await?;
        if job.status != JobStatus::Processing {
            tracing::info!("[job: {}] Skipping assembly, job is {}", job_id, job.status);
            return Ok(Vec::new());
        }
        let domain = self.load_domain(job.domain_id).await?;

        let changed = self
            .retry("load changed versions", || self.store.versions_for_job(job_id, true))
            .await?;
        if changed.is_empty() {
            tracing::info!("[job: {}] No page changed enough, nothing to assemble", job_id);
            self.publish(Event::FinalizeRequested {
                job_id,
                artifact_ids: Vec::new(),
            });
            return Ok(Vec::new());
        }

        let mut pages = Vec::with_capacity(changed.len());
        for job_page in changed {
            pages.push(self.artifact_page(job_page).await?);
        }

        let date = Utc::now();
        let mut artifact_ids = Vec::with_capacity(ArtifactKind::ALL.len());
        for kind in ArtifactKind::ALL {
            let document = match kind {
                ArtifactKind::Index => render_index(&domain.hostname, &pages),
                ArtifactKind::Full => render_full(&domain.hostname, &pages),
            };
            let path = core_ltx::blob::artifact_path(&domain.hostname, date, job_id, kind.file_name());
            self.retry("store artifact", || self.objects.put(&path, &document))
                .await?;
            let artifact = self
                .retry("record artifact", || self.store.create_artifact(job_id, domain.id, kind, &path))
                .await?;
            tracing::info!(
                "[job: {}] Wrote {} v{} ({} pages) to {}",
                job_id,
                kind.file_name(),
                artifact.version,
                pages.len(),
                path
            );
            artifact_ids.push(artifact.id);
        }

        self.publish(Event::FinalizeRequested {
            job_id,
            artifact_ids: artifact_ids.clone(),
        });
        Ok(artifact_ids)
    }

    async fn artifact_page(&self, job_page: JobPage) -> Result<ArtifactPage, Error> {
        let version = job_page.version;
        let content = self
            .retry("load processed page", || self.objects.get(&version.processed_path))
            .await?;
        Ok(ArtifactPage {
            url: job_page.url,
            title: version.title,
            description: version.description,
            summary: version.summary,
            content,
        })
    }
}
