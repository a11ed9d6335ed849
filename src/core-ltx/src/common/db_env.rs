use std::env::VarError;

use data_model_ltx::db::{DEFAULT_POOL_SIZE, DbPool, establish_connection_pool};

use super::{MaxConcurrencyError, max_concurrency};

/// Connects to DATABASE_URL with a pool of DB_POOL_SIZE connections.
/// WARNING: Panics if DATABASE_URL is not set, DB_POOL_SIZE is invalid, or the connection fails!
pub async fn get_db_pool() -> DbPool {
    let database_url = match get_database_url() {
        Ok(url) => url,
        Err(_) => panic!("DATABASE_URL must be set in .env file or present as an env var"),
    };
    let pool_size = match max_concurrency("DB_POOL_SIZE") {
        Ok(n) => n,
        Err(MaxConcurrencyError::MissingEnvVar(..)) => DEFAULT_POOL_SIZE,
        Err(e) => panic!("{}", e),
    };
    match establish_connection_pool(&database_url, pool_size).await {
        Ok(p) => {
            tracing::info!("Connected to the database with up to {} connections", pool_size);
            p
        }
        Err(e) => panic!("Couldn't connect to the database: {}", e),
    }
}

/// Retrieves the value for the env var DATABASE_URL.
pub fn get_database_url() -> Result<String, VarError> {
    std::env::var("DATABASE_URL")
}
