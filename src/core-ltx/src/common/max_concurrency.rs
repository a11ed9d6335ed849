use std::env::VarError;
use std::num::ParseIntError;

/// Retrieves the value of the environment variable as a positive usize.
/// Uses `usize` because the intended use of this value is in a semaphore, which requires a usize.
pub fn max_concurrency(env_var_name: &str) -> Result<usize, MaxConcurrencyError> {
    let raw = std::env::var(env_var_name).map_err(|e| MaxConcurrencyError::MissingEnvVar(env_var_name.to_string(), e))?;
    let value = raw.trim().parse::<usize>()?;
    if value == 0 {
        return Err(MaxConcurrencyError::NonPositive(env_var_name.to_string()));
    }
    Ok(value)
}

#[derive(Debug)]
pub enum MaxConcurrencyError {
    ParseIntError(ParseIntError),
    NonPositive(String),
    MissingEnvVar(String, VarError),
}

impl std::error::Error for MaxConcurrencyError {}

impl From<ParseIntError> for MaxConcurrencyError {
    fn from(error: ParseIntError) -> Self {
        Self::ParseIntError(error)
    }
}

impl std::fmt::Display for MaxConcurrencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::ParseIntError(e) => write!(f, "Failed to parse environment variable value as an integer: {}", e),
            Self::NonPositive(name) => write!(f, "{} must be a positive number", name),
            Self::MissingEnvVar(name, e) => write!(f, "Environment variable {} is missing: {}", name, e),
        }
    }
}
