use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{DeliveryOutcome, JobStore, StoreError, VersionOutcome};
use crate::models::{
    Artifact, ArtifactKind, Domain, Job, JobPage, JobStatus, Page, PageVersion, RecrawlCandidate, VersionCounts,
};

#[derive(Default)]
struct State {
    domains: HashMap<Uuid, Domain>,
    jobs: HashMap<Uuid, Job>,
    deliveries: HashSet<(Uuid, String)>,
    pages: HashMap<Uuid, Page>,
    versions: Vec<PageVersion>,
    counters: HashMap<(Uuid, ArtifactKind), i32>,
    artifacts: Vec<Artifact>,
}

impl State {
    fn processing_job(&mut self, job_id: Uuid) -> Option<&mut Job> {
        self.jobs.get_mut(&job_id).filter(|j| j.status == JobStatus::Processing)
    }

    fn page_url(&self, page_id: Uuid) -> String {
        self.pages.get(&page_id).map(|p| p.url.clone()).unwrap_or_default()
    }
}

/// In-process [`JobStore`]. A single mutex makes each operation atomic, which
/// gives the same guarantees as the conditional updates of [`super::PgStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // a panic while holding the lock cannot leave a half-applied operation behind
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn merge_stats(target: &mut serde_json::Value, extra: serde_json::Value) {
    match (target.as_object_mut(), extra) {
        (Some(map), serde_json::Value::Object(extra)) => map.extend(extra),
        (_, extra) => *target = extra,
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_domain(&self, domain: &Domain) -> Result<(), StoreError> {
        self.state().domains.insert(domain.id, domain.clone());
        Ok(())
    }

    async fn get_domain(&self, domain_id: Uuid) -> Result<Domain, StoreError> {
        self.state()
            .domains
            .get(&domain_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("domain", domain_id))
    }

    async fn find_domain_by_hostname(&self, hostname: &str) -> Result<Option<Domain>, StoreError> {
        Ok(self.state().domains.values().find(|d| d.hostname == hostname).cloned())
    }

    async fn recrawl_candidates(&self) -> Result<Vec<RecrawlCandidate>, StoreError> {
        let state = self.state();
        let mut candidates: Vec<RecrawlCandidate> = state
            .domains
            .values()
            .filter(|d| d.active)
            .map(|domain| {
                let last_job = state
                    .jobs
                    .values()
                    .filter(|j| j.domain_id == domain.id)
                    .max_by_key(|j| j.started_at)
                    .cloned();
                RecrawlCandidate {
                    domain: domain.clone(),
                    last_job,
                }
            })
            .collect();
        candidates.sort_by(|a, b| a.domain.hostname.cmp(&b.domain.hostname));
        Ok(candidates)
    }

    async fn has_finished_job(&self, domain_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .state()
            .jobs
            .values()
            .any(|j| j.domain_id == domain_id && j.status == JobStatus::Finished))
    }

    async fn create_job(&self, job: &Job) -> Result<Job, StoreError> {
        let mut state = self.state();
        let active = state
            .jobs
            .values()
            .any(|j| j.domain_id == job.domain_id && j.status == JobStatus::Processing);
        if active && job.status == JobStatus::Processing {
            return Err(StoreError::ActiveJobExists(job.domain_id));
        }
        state.jobs.insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn count_active_jobs(&self) -> Result<i64, StoreError> {
        Ok(self
            .state()
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Processing)
            .count() as i64)
    }

    async fn set_external_job_id(&self, job_id: Uuid, external_job_id: &str) -> Result<Option<Job>, StoreError> {
        let mut state = self.state();
        Ok(state.processing_job(job_id).map(|job| {
            job.external_job_id = Some(external_job_id.to_string());
            job.clone()
        }))
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Job, StoreError> {
        self.state()
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("job", job_id))
    }

    async fn list_active_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let mut active: Vec<Job> = self
            .state()
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Processing)
            .cloned()
            .collect();
        active.sort_by_key(|j| j.started_at);
        Ok(active)
    }

    async fn record_delivery(&self, job_id: Uuid, url: &str) -> Result<DeliveryOutcome, StoreError> {
        let mut state = self.state();
        let key = (job_id, url.to_string());
        if state.deliveries.contains(&key) {
            return Ok(DeliveryOutcome::Duplicate);
        }
        let Some(job) = state.processing_job(job_id) else {
            return Ok(DeliveryOutcome::JobNotProcessing);
        };
        job.pages_received += 1;
        let job = job.clone();
        state.deliveries.insert(key);
        Ok(DeliveryOutcome::Accepted(job))
    }

    async fn mark_stream_closed(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let mut state = self.state();
        Ok(state.processing_job(job_id).map(|job| {
            if !job.stream_closed {
                job.stream_closed = true;
                job.stream_closed_at = Some(Utc::now());
            }
            job.clone()
        }))
    }

    async fn try_claim_assembly(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state();
        match state.processing_job(job_id) {
            Some(job) if !job.assembly_claimed && job.is_ready_for_assembly() => {
                job.assembly_claimed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finish_job(&self, job_id: Uuid, stats: serde_json::Value) -> Result<Option<Job>, StoreError> {
        let mut state = self.state();
        Ok(state
            .processing_job(job_id)
            .filter(|j| j.assembly_claimed)
            .map(|job| {
                job.status = JobStatus::Finished;
                job.finished_at = Some(Utc::now());
                merge_stats(&mut job.stats, stats);
                job.clone()
            }))
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> Result<Option<Job>, StoreError> {
        let mut state = self.state();
        Ok(state.processing_job(job_id).map(|job| {
            job.status = JobStatus::Failed;
            job.finished_at = Some(Utc::now());
            merge_stats(&mut job.stats, serde_json::json!({ "error": error }));
            job.clone()
        }))
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let mut state = self.state();
        Ok(state.processing_job(job_id).map(|job| {
            job.status = JobStatus::Canceled;
            job.finished_at = Some(Utc::now());
            job.clone()
        }))
    }

    async fn upsert_page(&self, domain_id: Uuid, url: &str) -> Result<Page, StoreError> {
        let mut state = self.state();
        if let Some(page) = state.pages.values().find(|p| p.domain_id == domain_id && p.url == url) {
            return Ok(page.clone());
        }
        let page = Page::new(domain_id, url);
        state.pages.insert(page.id, page.clone());
        Ok(page)
    }

    async fn previous_version(&self, page_id: Uuid, job_id: Uuid) -> Result<Option<PageVersion>, StoreError> {
        Ok(self
            .state()
            .versions
            .iter()
            .filter(|v| v.page_id == page_id && v.job_id != job_id)
            .max_by_key(|v| v.created_at)
            .cloned())
    }

    async fn has_page_version(&self, page_id: Uuid, job_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .state()
            .versions
            .iter()
            .any(|v| v.page_id == page_id && v.job_id == job_id))
    }

    async fn record_page_version(&self, version: &PageVersion) -> Result<VersionOutcome, StoreError> {
        let mut state = self.state();
        if state
            .versions
            .iter()
            .any(|v| v.page_id == version.page_id && v.job_id == version.job_id)
        {
            return Ok(VersionOutcome::Duplicate);
        }
        let job = match state.processing_job(version.job_id) {
            Some(job) if job.pages_processed < job.pages_received => {
                job.pages_processed += 1;
                job.clone()
            }
            _ => return Ok(VersionOutcome::JobNotProcessing),
        };
        state.versions.push(version.clone());
        if let Some(page) = state.pages.get_mut(&version.page_id) {
            page.last_known_version = Some(version.id);
        }
        Ok(VersionOutcome::Recorded(job))
    }

    async fn versions_for_job(&self, job_id: Uuid, changed_only: bool) -> Result<Vec<JobPage>, StoreError> {
        let state = self.state();
        let mut found: Vec<JobPage> = state
            .versions
            .iter()
            .filter(|v| v.job_id == job_id && (!changed_only || v.changed_enough))
            .map(|v| JobPage {
                url: state.page_url(v.page_id),
                version: v.clone(),
            })
            .collect();
        found.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(found)
    }

    async fn version_counts(&self, job_id: Uuid) -> Result<VersionCounts, StoreError> {
        let state = self.state();
        let versions = state.versions.iter().filter(|v| v.job_id == job_id);
        let (total, changed) = versions.fold((0, 0), |(total, changed), v| {
            (total + 1, changed + i64::from(v.changed_enough))
        });
        Ok(VersionCounts { total, changed })
    }

    async fn create_artifact(
        &self,
        job_id: Uuid,
        domain_id: Uuid,
        kind: ArtifactKind,
        blob_path: &str,
    ) -> Result<Artifact, StoreError> {
        let mut state = self.state();
        let counter = state.counters.entry((domain_id, kind)).or_insert(0);
        *counter += 1;
        let artifact = Artifact {
            id: Uuid::new_v4(),
            job_id,
            domain_id,
            kind,
            blob_path: blob_path.to_string(),
            version: *counter,
            created_at: Utc::now(),
        };
        state.artifacts.push(artifact.clone());
        Ok(artifact)
    }

    async fn latest_artifact(&self, domain_id: Uuid, kind: ArtifactKind) -> Result<Option<Artifact>, StoreError> {
        Ok(self
            .state()
            .artifacts
            .iter()
            .filter(|a| a.domain_id == domain_id && a.kind == kind)
            .max_by_key(|a| a.version)
            .cloned())
    }

    async fn artifacts_for_job(&self, job_id: Uuid) -> Result<Vec<Artifact>, StoreError> {
        let mut found: Vec<Artifact> = self
            .state()
            .artifacts
            .iter()
            .filter(|a| a.job_id == job_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.kind == ArtifactKind::Full, a.version));
        Ok(found)
    }
}
