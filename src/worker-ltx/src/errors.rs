use data_model_ltx::store::StoreError;
use tokio::sync::AcquireError;
use uuid::Uuid;

#[derive(Debug)]
pub enum Error {
    StoreError(StoreError),
    CoreError(core_ltx::Error),
    DomainInactive(String),
    UnknownHostname(String),
    AtCapacity { active: i64, limit: usize },
    ExternalIdMismatch { job_id: Uuid, expected: String, received: String },
    ExternalIdPending(Uuid),
    JobNotProcessing(Uuid),
    SemaphorePermitError(AcquireError),
}

impl Error {
    /// Whether the failed operation may succeed if repeated later.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::StoreError(e) => e.is_retriable(),
            Self::CoreError(e) => e.is_retriable(),
            Self::AtCapacity { .. } | Self::ExternalIdPending(_) => true,
            _ => false,
        }
    }

    /// The job (or entity) the request referred to does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StoreError(StoreError::NotFound { .. }) | Self::UnknownHostname(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreError(e) => write!(f, "{}", e),
            Self::CoreError(e) => write!(f, "{}", e),
            Self::DomainInactive(hostname) => write!(f, "Domain '{}' is not active", hostname),
            Self::UnknownHostname(hostname) => write!(f, "No domain registered for '{}'", hostname),
            Self::AtCapacity { active, limit } => {
                write!(f, "Too many active jobs ({} of {}), try again later", active, limit)
            }
            Self::ExternalIdMismatch {
                job_id,
                expected,
                received,
            } => write!(
                f,
                "Event for crawl '{}' does not belong to job {} (crawl '{}')",
                received, job_id, expected
            ),
            Self::ExternalIdPending(job_id) => {
                write!(f, "Job {} has not recorded its crawl id yet", job_id)
            }
            Self::JobNotProcessing(job_id) => write!(f, "Job {} is no longer processing", job_id),
            Self::SemaphorePermitError(e) => write!(f, "Failed to acquire semaphore permit: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::JobNotProcessing(job_id) => Self::JobNotProcessing(job_id),
            _ => Self::StoreError(error),
        }
    }
}

impl From<core_ltx::Error> for Error {
    fn from(error: core_ltx::Error) -> Self {
        Self::CoreError(error)
    }
}

impl From<AcquireError> for Error {
    fn from(error: AcquireError) -> Self {
        Self::SemaphorePermitError(error)
    }
}
