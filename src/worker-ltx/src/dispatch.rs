//! Executes pipeline events, one spawned task per event, with bounded concurrency.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::events::{Event, EventReceiver};
use crate::{Error, Pipeline};

pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    events: EventReceiver,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    pub(crate) fn new(pipeline: Arc<Pipeline>, events: EventReceiver) -> Self {
        let permits = Arc::new(Semaphore::new(pipeline.config.worker_max_concurrency.max(1)));
        Self {
            pipeline,
            events,
            permits,
            tasks: JoinSet::new(),
        }
    }

    /// Handles events until every sender is gone, then waits for running handlers.
    pub async fn run(mut self) {
        tracing::info!("Dispatcher started");
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.spawn(event).await,
                    None => break,
                },
                Some(result) = self.tasks.join_next(), if !self.tasks.is_empty() => reap(result),
            }
        }
        while let Some(result) = self.tasks.join_next().await {
            reap(result);
        }
        tracing::info!("Dispatcher stopped");
    }

    /// Handles queued events, including the ones they publish, until the queue
    /// is empty and no handler is running.
    pub async fn drain(&mut self) {
        loop {
            if let Ok(event) = self.events.try_recv() {
                self.spawn(event).await;
                continue;
            }
            match self.tasks.join_next().await {
                Some(result) => reap(result),
                None => break,
            }
        }
    }

    async fn spawn(&mut self, event: Event) {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!("[job: {}] Dropping {} event: {}", event.job_id(), event.name(), e);
                return;
            }
        };
        let pipeline = self.pipeline.clone();
        self.tasks.spawn(async move {
            handle(&pipeline, event).await;
            drop(permit);
        });
    }
}

fn reap(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!("Event handler task panicked: {}", e);
    }
}

/// Runs the stage for one event. A failed stage ends only its own task, except that
/// failures after retries are exhausted, and any failure once assembly is claimed,
/// mark the job failed so its domain is released.
pub async fn handle(pipeline: &Pipeline, event: Event) {
    let job_id = event.job_id();
    let name = event.name();
    let claimed = matches!(event, Event::AssemblyRequested { .. } | Event::FinalizeRequested { .. });

    let result: Result<(), Error> = match event {
        Event::ProcessPage(request) => pipeline.process_page(request).await.map(|_| ()),
        Event::PageProcessed {
            job_id,
            page_id,
            changed,
        } => {
            tracing::trace!("[job: {}] Page {} processed (changed: {})", job_id, page_id, changed);
            Ok(())
        }
        Event::AssemblyRequested { job_id } => pipeline.assemble(job_id).await.map(|_| ()),
        Event::FinalizeRequested { job_id, artifact_ids } => pipeline.finalize(job_id, artifact_ids).await.map(|_| ()),
    };

    if let Err(error) = result {
        if claimed || error.is_retriable() {
            tracing::error!("[job: {}] {} failed: {}", job_id, name, error);
            pipeline.fail_job(job_id, &format!("{} failed: {}", name, error)).await;
        } else {
            tracing::error!("[job: {}] [SKIP] {} failed: {}", job_id, name, error);
        }
    }
}
