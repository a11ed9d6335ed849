use std::future::Future;
use std::sync::Arc;

use core_ltx::blob::ObjectStore;
use core_ltx::crawl::CrawlProvider;
use core_ltx::llms::Summarizer;
use core_ltx::retry::{Retriable, with_backoff};
use data_model_ltx::models::{Domain, Job};
use data_model_ltx::store::JobStore;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::dispatch::Dispatcher;
use crate::events::{Event, EventBus};
use crate::Error;

/// The services the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn JobStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub crawler: Arc<dyn CrawlProvider>,
    /// Pages are not summarized when absent.
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

/// Shared state of every pipeline stage. The stage operations live in the
/// [`launch`](crate::launch), [`ingest`](crate::ingest), [`process`](crate::process),
/// [`completion`](crate::completion), [`assemble`](crate::assemble) and
/// [`finalize`](crate::finalize) modules.
pub struct Pipeline {
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) objects: Arc<dyn ObjectStore>,
    pub(crate) crawler: Arc<dyn CrawlProvider>,
    pub(crate) summarizer: Option<Arc<dyn Summarizer>>,
    pub(crate) config: PipelineConfig,
    pub(crate) launch_permits: Semaphore,
    bus: EventBus,
}

impl Pipeline {
    /// Wires the pipeline to its collaborators and returns the dispatcher that
    /// executes its events. The dispatcher must be run for jobs to progress.
    pub fn build(collaborators: Collaborators, config: PipelineConfig) -> (Arc<Pipeline>, Dispatcher) {
        let (bus, events) = EventBus::new();
        let pipeline = Arc::new(Pipeline {
            store: collaborators.store,
            objects: collaborators.objects,
            crawler: collaborators.crawler,
            summarizer: collaborators.summarizer,
            launch_permits: Semaphore::new(config.max_concurrent_launches.max(1)),
            config,
            bus,
        });
        let dispatcher = Dispatcher::new(pipeline.clone(), events);
        (pipeline, dispatcher)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub(crate) fn publish(&self, event: Event) {
        self.bus.publish(event);
    }

    /// Runs `op` under the configured retry policy.
    pub(crate) async fn retry<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retriable + std::fmt::Display,
        Error: From<E>,
    {
        Ok(with_backoff(&self.config.retry, label, op).await?)
    }

    pub(crate) async fn load_job(&self, job_id: Uuid) -> Result<Job, Error> {
        self.retry("load job", || self.store.get_job(job_id)).await
    }

    pub(crate) async fn load_domain(&self, domain_id: Uuid) -> Result<Domain, Error> {
        self.retry("load domain", || self.store.get_domain(domain_id)).await
    }

    /// Marks the job failed with `reason`. Failures to do so are logged, not returned.
    pub async fn fail_job(&self, job_id: Uuid, reason: &str) -> Option<Job> {
        match self.retry("fail job", || self.store.fail_job(job_id, reason)).await {
            Ok(Some(job)) => {
                tracing::warn!("[job: {}] Marked failed: {}", job_id, reason);
                Some(job)
            }
            Ok(None) => {
                tracing::debug!("[job: {}] Not failed, job had already left processing", job_id);
                None
            }
            Err(e) => {
                tracing::error!("[job: {}] Could not mark job failed ({}): {}", job_id, reason, e);
                None
            }
        }
    }

    /// processing -> canceled. Stages that are still running observe the cancellation
    /// at their next conditional write. Returns `None` if the job was not processing.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<Option<Job>, Error> {
        self.load_job(job_id).await?;
        let canceled = self.retry("cancel job", || self.store.cancel_job(job_id)).await?;
        if canceled.is_some() {
            tracing::info!("[job: {}] Canceled", job_id);
        }
        Ok(canceled)
    }
}
