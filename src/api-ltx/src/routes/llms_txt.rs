use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use core_ltx::normalize_hostname;
use data_model_ltx::models::{ArtifactKind, ArtifactQuery, ArtifactResponse};

use crate::errors::ApiError;
use crate::state::AppState;

/// GET /api/llms_txt - The latest published artifact for a hostname.
///
/// `kind` defaults to the condensed index. A domain whose crawls never changed
/// anything has no artifact and gets a 404.
pub async fn get_llms_txt(
    State(state): State<AppState>,
    Query(query): Query<ArtifactQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hostname = normalize_hostname(&query.hostname)?;
    let kind = query.kind.unwrap_or(ArtifactKind::Index);

    let domain = state
        .store()
        .find_domain_by_hostname(&hostname)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No domain registered for '{}'", hostname)))?;

    let artifact = state
        .store()
        .latest_artifact(domain.id, kind)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No {} published for '{}' yet", kind.file_name(), hostname)))?;

    let content = state.objects.get(&artifact.blob_path).await?;
    tracing::debug!(
        "Serving {} v{} for {} from {}",
        kind.file_name(),
        artifact.version,
        hostname,
        artifact.blob_path
    );

    Ok((
        StatusCode::OK,
        Json(ArtifactResponse {
            job_id: artifact.job_id,
            kind,
            version: artifact.version,
            content,
        }),
    ))
}
