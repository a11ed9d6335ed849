//! Callbacks from the crawl provider.

use axum::{
    body::Bytes,
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use core_ltx::crawl::{
    CrawlWebhook,
    webhook::{EVENT_COMPLETED, EVENT_FAILED, EVENT_PAGE, EVENT_STARTED},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use worker_ltx::{CrawlCompleted, CrawlFailed, CrawlPage, IngestOutcome};

use crate::errors::ApiError;
use crate::signature::{SIGNATURE_HEADER, verify};
use crate::state::AppState;

/// Tally of what a callback did.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub accepted: usize,
    pub duplicates: usize,
    pub ignored: usize,
}

impl WebhookAck {
    fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Accepted => self.accepted += 1,
            IngestOutcome::Duplicate => self.duplicates += 1,
            IngestOutcome::Ignored(_) => self.ignored += 1,
        }
    }
}

/// POST /api/webhook/crawl/{job_id}
///
/// Anything that changes nothing (a redelivery, an event for a job that is no longer
/// processing, `crawl.started`) is still acknowledged with 200 so the provider stops
/// retrying. 503 asks the provider to redeliver later.
pub async fn post_crawl_webhook(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        verify(&body, signature, secret)?;
    }

    let hook: CrawlWebhook = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed crawl callback: {}", e)))?;
    tracing::debug!("[job: {}] {} callback from crawl '{}'", job_id, hook.event_type, hook.id);

    let mut ack = WebhookAck::default();
    match hook.event_type.as_str() {
        EVENT_STARTED => ack.ignored += 1,
        EVENT_PAGE => {
            // A batch is rejected whole; nothing is ingested until every page has a URL.
            let pages = hook
                .data
                .into_iter()
                .map(|page| {
                    let url = page
                        .metadata
                        .source_url
                        .clone()
                        .filter(|u| !u.trim().is_empty())
                        .ok_or_else(|| ApiError::BadRequest("Crawled page without a source URL".to_string()))?;
                    Ok(CrawlPage {
                        job_id,
                        external_job_id: hook.id.clone(),
                        url,
                        content: page.content().unwrap_or_default().to_string(),
                        metadata: page.metadata,
                    })
                })
                .collect::<Result<Vec<_>, ApiError>>()?;
            for page in pages {
                let outcome = state.pipeline.ingest_page(page).await?;
                ack.record(outcome);
            }
        }
        EVENT_COMPLETED => {
            let outcome = state
                .pipeline
                .stream_closed(CrawlCompleted {
                    job_id,
                    external_job_id: hook.id,
                    total: hook.total,
                })
                .await?;
            ack.record(outcome);
        }
        EVENT_FAILED => {
            let outcome = state
                .pipeline
                .crawl_failed(CrawlFailed {
                    job_id,
                    external_job_id: hook.id,
                    error: hook.error.unwrap_or_else(|| "crawl provider reported a failure".to_string()),
                })
                .await?;
            ack.record(outcome);
        }
        other => {
            return Err(ApiError::BadRequest(format!("Unknown crawl callback type '{}'", other)));
        }
    }

    Ok((StatusCode::OK, Json(ack)))
}
