pub mod assemble;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod finalize;
pub mod ingest;
pub mod launch;
pub mod pipeline;
pub mod process;

pub use completion::EMPTY_CRAWL_REASON;
pub use config::{ConfigError, PipelineConfig};
pub use dispatch::Dispatcher;
pub use errors::Error;
pub use events::{Event, EventBus, ProcessPage};
pub use finalize::JobStats;
pub use ingest::{CrawlCompleted, CrawlFailed, CrawlPage, IngestOutcome};
pub use pipeline::{Collaborators, Pipeline};
