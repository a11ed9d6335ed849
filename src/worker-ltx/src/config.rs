//! Pipeline tuning read from the environment.

use std::num::ParseIntError;

use core_ltx::diff::DEFAULT_SIMILARITY_THRESHOLD;
use core_ltx::retry::RetryPolicy;
use core_ltx::{HostPortError, MaxConcurrencyError, env_flag, get_public_base_url, is_env_set, max_concurrency};
use uuid::Uuid;

pub const DEFAULT_MAX_CONCURRENT_LAUNCHES: usize = 8;
pub const DEFAULT_WORKER_MAX_CONCURRENCY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Similarity at or above which a page counts as unchanged.
    pub similarity_threshold: f64,
    /// Crawls that may be starting on the provider at the same time.
    pub max_concurrent_launches: usize,
    /// Soft cap on processing jobs. Launches past it are refused as retriable.
    pub max_active_jobs: Option<usize>,
    /// Event handlers that may run at the same time.
    pub worker_max_concurrency: usize,
    pub retry: RetryPolicy,
    /// Base URL the crawl provider calls back to.
    pub public_base_url: String,
    pub summarize_pages: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_concurrent_launches: DEFAULT_MAX_CONCURRENT_LAUNCHES,
            max_active_jobs: None,
            worker_max_concurrency: DEFAULT_WORKER_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
            public_base_url: "http://127.0.0.1:3000".to_string(),
            summarize_pages: false,
        }
    }
}

impl PipelineConfig {
    /// Reads CHANGE_SIMILARITY_THRESHOLD, MAX_CONCURRENT_LAUNCHES, MAX_ACTIVE_JOBS,
    /// WORKER_MAX_CONCURRENCY, RETRY_MAX_ATTEMPTS, RETRY_BASE_DELAY_MS, PUBLIC_BASE_URL
    /// and SUMMARIZE_PAGES. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let similarity_threshold = match std::env::var("CHANGE_SIMILARITY_THRESHOLD") {
            Ok(raw) => parse_threshold(&raw)?,
            Err(_) => defaults.similarity_threshold,
        };

        Ok(Self {
            similarity_threshold,
            max_concurrent_launches: optional_limit("MAX_CONCURRENT_LAUNCHES")?
                .unwrap_or(defaults.max_concurrent_launches),
            max_active_jobs: optional_limit("MAX_ACTIVE_JOBS")?,
            worker_max_concurrency: optional_limit("WORKER_MAX_CONCURRENCY")?
                .unwrap_or(defaults.worker_max_concurrency),
            retry: RetryPolicy::from_env()?,
            public_base_url: get_public_base_url()?,
            summarize_pages: env_flag("SUMMARIZE_PAGES", is_env_set("OPENAI_API_KEY")),
        })
    }

    /// Where the provider reports pages for `job_id`.
    pub fn callback_target(&self, job_id: Uuid) -> String {
        format!(
            "{}/api/webhook/crawl/{}",
            self.public_base_url.trim_end_matches('/'),
            job_id
        )
    }
}

fn parse_threshold(raw: &str) -> Result<f64, ConfigError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if (0.0..=1.0).contains(&value) => Ok(value),
        _ => Err(ConfigError::InvalidThreshold(raw.to_string())),
    }
}

fn optional_limit(env_var_name: &str) -> Result<Option<usize>, ConfigError> {
    match max_concurrency(env_var_name) {
        Ok(limit) => Ok(Some(limit)),
        Err(MaxConcurrencyError::MissingEnvVar(..)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidThreshold(String),
    Limit(MaxConcurrencyError),
    Retry(ParseIntError),
    BaseUrl(HostPortError),
}

impl std::error::Error for ConfigError {}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidThreshold(raw) => write!(
                f,
                "CHANGE_SIMILARITY_THRESHOLD must be a number between 0 and 1, got '{}'",
                raw
            ),
            Self::Limit(e) => write!(f, "{}", e),
            Self::Retry(e) => write!(f, "Invalid retry setting: {}", e),
            Self::BaseUrl(e) => write!(f, "Invalid public base URL: {}", e),
        }
    }
}

impl From<MaxConcurrencyError> for ConfigError {
    fn from(error: MaxConcurrencyError) -> Self {
        Self::Limit(error)
    }
}

impl From<ParseIntError> for ConfigError {
    fn from(error: ParseIntError) -> Self {
        Self::Retry(error)
    }
}

impl From<HostPortError> for ConfigError {
    fn from(error: HostPortError) -> Self {
        Self::BaseUrl(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_bounds() {
        assert_eq!(parse_threshold("0.9").unwrap(), 0.9);
        assert_eq!(parse_threshold(" 1 ").unwrap(), 1.0);
        assert!(parse_threshold("1.5").is_err());
        assert!(parse_threshold("-0.1").is_err());
        assert!(parse_threshold("high").is_err());
    }

    #[test]
    fn test_callback_target() {
        let config = PipelineConfig {
            public_base_url: "https://ltx.example.org/".to_string(),
            ..PipelineConfig::default()
        };
        let job_id = Uuid::nil();
        assert_eq!(
            config.callback_target(job_id),
            format!("https://ltx.example.org/api/webhook/crawl/{}", job_id)
        );
    }

    #[test]
    fn test_unset_limit_is_none() {
        assert_eq!(optional_limit("LTX_TEST_UNSET_LIMIT").unwrap(), None);
    }
}
