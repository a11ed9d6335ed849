use axum::{
    Router, middleware,
    routing::{get, post},
};
use core_ltx::health_check;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod job_state;
pub mod llms_txt;
pub mod logging_middleware;
pub mod webhook;

//
// Router
//

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/ingest", post(job_state::post_ingest))
        .route("/api/recrawl", post(job_state::post_recrawl))
        .route("/api/job", get(job_state::get_job))
        .route("/api/jobs/in_progress", get(job_state::get_in_progress_jobs))
        .route("/api/jobs/{job_id}/cancel", post(job_state::post_cancel))
        .route("/api/webhook/crawl/{job_id}", post(webhook::post_crawl_webhook))
        .route("/api/llms_txt", get(llms_txt::get_llms_txt))
        // Custom route access logging
        .layer(middleware::from_fn(logging_middleware::log_route_access))
        // Tracing middleware
        .layer(TraceLayer::new_for_http())
}
