use data_model_ltx::store::StoreError;

#[derive(Debug)]
pub enum Error {
    StoreError(StoreError),
    HttpError(reqwest::Error),
    /// The API refused the recrawl with something other than a conflict.
    Rejected { status: u16, body: String },
    /// The domain already has a processing job.
    JobInProgress,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreError(e) => write!(f, "Store error: {}", e),
            Self::HttpError(e) => write!(f, "HTTP error: {}", e),
            Self::Rejected { status, body } => write!(f, "API rejected request ({}): {}", status, body),
            Self::JobInProgress => write!(f, "Job already in progress"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::StoreError(error)
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::HttpError(error)
    }
}
