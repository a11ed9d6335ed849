use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::deadpool::Pool;

pub type PoolError = deadpool::managed::PoolError<diesel_async::pooled_connection::PoolError>;

pub type DbPool = Pool<AsyncPgConnection>;

/// Pool size when the caller has no opinion. Each in-flight pipeline stage holds at most one connection.
pub const DEFAULT_POOL_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionPoolError {
    #[error("Failed to build connection pool: {0}")]
    BuildError(#[from] deadpool::managed::BuildError),
    #[error("Database unreachable: {0}")]
    ConnectionError(#[from] PoolError),
}

/// Builds a pool of at most `max_size` connections and checks out one connection,
/// so an unreachable database is reported here rather than on the first query.
pub async fn establish_connection_pool(database_url: &str, max_size: usize) -> Result<DbPool, ConnectionPoolError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder(manager).max_size(max_size.max(1)).build()?;
    drop(pool.get().await?);
    Ok(pool)
}
