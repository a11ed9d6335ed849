use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use data_model_ltx::store::StoreError;
use serde::Serialize;

use crate::signature::SignatureError;

/// Error body: `{"error": "<kind>", "details": "<message>"}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    details: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!("{} response: {}", status, self);
        }
        let body = ErrorBody {
            error: kind,
            details: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<worker_ltx::Error> for ApiError {
    fn from(error: worker_ltx::Error) -> Self {
        use worker_ltx::Error;
        let message = error.to_string();
        match error {
            _ if error.is_not_found() => ApiError::NotFound(message),
            Error::StoreError(StoreError::ActiveJobExists(_)) | Error::ExternalIdMismatch { .. } => {
                ApiError::Conflict(message)
            }
            Error::JobNotProcessing(_) => ApiError::Conflict(message),
            Error::DomainInactive(_) => ApiError::Unprocessable(message),
            Error::CoreError(core_ltx::Error::InvalidHostname(_) | core_ltx::Error::InvalidUrl(_)) => {
                ApiError::Unprocessable(message)
            }
            _ if error.is_retriable() => ApiError::Unavailable(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        worker_ltx::Error::from(error).into()
    }
}

impl From<core_ltx::Error> for ApiError {
    fn from(error: core_ltx::Error) -> Self {
        match error {
            core_ltx::Error::BlobNotFound(_) => ApiError::NotFound(error.to_string()),
            _ => worker_ltx::Error::from(error).into(),
        }
    }
}

impl From<SignatureError> for ApiError {
    fn from(error: SignatureError) -> Self {
        ApiError::Unauthorized(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_pipeline_errors_map_to_status_codes() {
        let status = |e: worker_ltx::Error| ApiError::from(e).status_and_kind().0;

        assert_eq!(
            status(StoreError::not_found("domain", Uuid::nil()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(worker_ltx::Error::UnknownHostname("example.com".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(StoreError::ActiveJobExists(Uuid::nil()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(worker_ltx::Error::ExternalIdMismatch {
                job_id: Uuid::nil(),
                expected: "a".into(),
                received: "b".into(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(worker_ltx::Error::DomainInactive("example.com".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(worker_ltx::Error::ExternalIdPending(Uuid::nil())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(worker_ltx::Error::AtCapacity { active: 3, limit: 3 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_missing_blob_is_not_found() {
        let err = ApiError::from(core_ltx::Error::BlobNotFound("artifacts/x".into()));
        assert_eq!(err.status_and_kind().0, StatusCode::NOT_FOUND);
    }
}
