//! Completion Detector.
//!
//! A job is ready for assembly once the provider closed the stream, at least one
//! page was received, and every received page has been processed. Readiness is
//! evaluated by the store against persisted state, and the move to assembly is a
//! single compare-and-set that exactly one caller wins.

use uuid::Uuid;

use crate::events::Event;
use crate::{Error, Pipeline};

pub use data_model_ltx::models::EMPTY_CRAWL_REASON;

impl Pipeline {
    /// Claims assembly for the job if it is ready. Returns true for the caller that won the claim.
    pub async fn check_completion(&self, job_id: Uuid) -> Result<bool, Error> {
        let claimed = self
            .retry("claim assembly", || self.store.try_claim_assembly(job_id))
            .await?;
        if claimed {
            tracing::info!("[job: {}] All pages processed, assembly claimed", job_id);
            self.publish(Event::AssemblyRequested { job_id });
        }
        Ok(claimed)
    }
}
