pub mod api_client;
pub mod errors;
pub mod schedule;
pub mod sweep;

pub use api_client::{ApiClient, Recrawler};
pub use errors::Error;
pub use schedule::{due_for_recrawl, schedule_recrawls};
pub use sweep::{SweepConfig, stale_reason, sweep_stale_jobs};
