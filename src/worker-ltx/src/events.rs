//! Messages passed between pipeline stages.
//!
//! Inbound provider events enter through the handlers in [`crate::ingest`]. Everything
//! downstream of an accepted page travels over the [`EventBus`] and is executed by the
//! [`crate::Dispatcher`], one short-lived task per event.

use core_ltx::crawl::PageMetadata;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A page that was accepted for a job and whose raw content is in the object store.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessPage {
    pub job_id: Uuid,
    pub page_id: Uuid,
    pub url: String,
    pub raw_path: String,
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ProcessPage(ProcessPage),
    PageProcessed { job_id: Uuid, page_id: Uuid, changed: bool },
    AssemblyRequested { job_id: Uuid },
    FinalizeRequested { job_id: Uuid, artifact_ids: Vec<Uuid> },
}

impl Event {
    pub fn job_id(&self) -> Uuid {
        match self {
            Event::ProcessPage(page) => page.job_id,
            Event::PageProcessed { job_id, .. }
            | Event::AssemblyRequested { job_id }
            | Event::FinalizeRequested { job_id, .. } => *job_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::ProcessPage(_) => "process-page",
            Event::PageProcessed { .. } => "page-processed",
            Event::AssemblyRequested { .. } => "assembly-requested",
            Event::FinalizeRequested { .. } => "finalize-requested",
        }
    }
}

/// Sending half of the pipeline's event queue.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: mpsc::UnboundedSender<Event>,
}

pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

impl EventBus {
    pub fn new() -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn publish(&self, event: Event) {
        let name = event.name();
        let job_id = event.job_id();
        if self.sender.send(event).is_err() {
            tracing::error!("[job: {}] Dropped {} event: dispatcher has shut down", job_id, name);
        }
    }
}
