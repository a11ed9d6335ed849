/// Custom error type for content handling and the external collaborators (crawl provider, object store, LLM).
#[derive(Debug)]
pub enum Error {
    /// User supplied an invalid URL.
    InvalidUrl(url::ParseError),

    /// URL parsed but has no usable host.
    InvalidHostname(String),

    /// Transport-level failure talking to an HTTP collaborator.
    HttpError(reqwest::Error),

    /// An HTTP collaborator answered with a non-success status.
    ProviderRejected { status: u16, message: String },

    /// Reading or writing a blob failed.
    Io(std::io::Error),

    /// No blob is stored at the given path.
    BlobNotFound(String),

    /// A stored blob is not valid UTF-8.
    InvalidUtf8(std::string::FromUtf8Error),

    /// Internal error: prompt substitution failed.
    PromptCreationFailure(subst::Error),

    /// Error calling ChatGPT
    ChatGptError(async_openai::error::OpenAIError),

    /// The LLM answered, but not with a summary we can parse.
    SummaryParse(String),

    /// The LLM returned no choices.
    NoResponse,
}

impl Error {
    /// Transient failures: the same call may succeed if repeated.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::ProviderRejected { status, .. } => *status == 429 || *status >= 500,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidUrl(url) => write!(f, "Not a valid URL: {}", url),
            Error::InvalidHostname(host) => write!(f, "Not a valid hostname: '{}'", host),
            Error::HttpError(err) => write!(f, "HTTP error: {}", err),
            Error::ProviderRejected { status, message } => {
                write!(f, "Provider rejected request ({}): {}", status, message)
            }
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::BlobNotFound(path) => write!(f, "No blob stored at: {}", path),
            Error::InvalidUtf8(err) => write!(f, "Blob is not valid UTF-8: {}", err),
            Error::PromptCreationFailure(err) => write!(f, "Failed to create prompt: {}", err),
            Error::ChatGptError(err) => write!(f, "Error calling ChatGPT: {}", err),
            Error::SummaryParse(msg) => write!(f, "Could not parse summary: {}", msg),
            Error::NoResponse => write!(f, "No response from LLM"),
        }
    }
}

impl std::error::Error for Error {}

/// Request errors occur when talking to the crawl provider.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::HttpError(err)
    }
}

/// URL parsing errors occur during URL validation.
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err)
    }
}

/// Converting from bytes to UTF-8 strings occurs when reading blobs back.
impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::InvalidUtf8(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::BlobNotFound(err.to_string())
        } else {
            Error::Io(err)
        }
    }
}

impl From<subst::Error> for Error {
    fn from(err: subst::Error) -> Self {
        Error::PromptCreationFailure(err)
    }
}

impl From<async_openai::error::OpenAIError> for Error {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Error::ChatGptError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SummaryParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_classification() {
        let throttled = Error::ProviderRejected {
            status: 429,
            message: "slow down".into(),
        };
        let unavailable = Error::ProviderRejected {
            status: 503,
            message: "".into(),
        };
        let bad_request = Error::ProviderRejected {
            status: 400,
            message: "bad url".into(),
        };
        assert!(throttled.is_retriable());
        assert!(unavailable.is_retriable());
        assert!(!bad_request.is_retriable());
        assert!(!Error::InvalidHostname("".into()).is_retriable());
    }

    #[test]
    fn test_missing_file_maps_to_blob_not_found() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::BlobNotFound(_)));
    }
}
