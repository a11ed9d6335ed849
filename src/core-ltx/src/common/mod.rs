mod db_env;
mod env_check;
mod health;
mod hostname;
mod logging;
mod max_concurrency;
mod poll_interval;

pub use db_env::{get_database_url, get_db_pool};
pub use env_check::{env_flag, is_env_set};
pub use health::health_check;
pub use hostname::{HostPortError, get_api_base_url, get_public_base_url};
pub use logging::{default_log_filter, setup_logging};
pub use max_concurrency::{MaxConcurrencyError, max_concurrency};
pub use poll_interval::{TimeUnit, get_poll_interval, poll_interval};
