use std::sync::Arc;

use core_ltx::blob::ObjectStore;
use data_model_ltx::store::JobStore;
use worker_ltx::Pipeline;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub objects: Arc<dyn ObjectStore>,
    /// When set, webhook bodies must carry a valid signature.
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, objects: Arc<dyn ObjectStore>, webhook_secret: Option<String>) -> Self {
        Self {
            pipeline,
            objects,
            webhook_secret: webhook_secret
                .filter(|s| !s.trim().is_empty())
                .map(Arc::from),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        self.pipeline.store()
    }
}
