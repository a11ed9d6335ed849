use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use data_model_ltx::models::{IngestPayload, JobIdPayload, JobIdResponse, RecrawlPayload};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::state::AppState;

// POST /api/ingest - Launch a crawl of a registered domain
pub async fn post_ingest(
    State(state): State<AppState>,
    Json(payload): Json<IngestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.pipeline.launch_crawl(payload.domain_id, payload.kind).await?;
    Ok((StatusCode::CREATED, Json(JobIdResponse { job_id: job.id })))
}

// POST /api/recrawl - Launch a crawl of a domain by hostname
pub async fn post_recrawl(
    State(state): State<AppState>,
    Json(payload): Json<RecrawlPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.pipeline.recrawl(&payload.hostname).await?;
    tracing::debug!("Recrawl of {} started as job {}", payload.hostname, job.id);
    Ok((StatusCode::CREATED, Json(JobIdResponse { job_id: job.id })))
}

// POST /api/jobs/{job_id}/cancel - Cancel a processing job
pub async fn post_cancel(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.pipeline.cancel_job(job_id).await? {
        Some(job) => Ok((StatusCode::OK, Json(job))),
        None => {
            let job = state.store().get_job(job_id).await?;
            Err(ApiError::Conflict(format!("Job {} is already {}", job_id, job.status)))
        }
    }
}

// GET /api/job - Get full job details by job_id
pub async fn get_job(
    State(state): State<AppState>,
    Query(payload): Query<JobIdPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.store().get_job(payload.job_id).await?;
    Ok((StatusCode::OK, Json(job)))
}

// GET /api/jobs/in_progress - List all processing jobs
pub async fn get_in_progress_jobs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let jobs = state.store().list_active_jobs().await?;
    Ok((StatusCode::OK, Json(jobs)))
}
