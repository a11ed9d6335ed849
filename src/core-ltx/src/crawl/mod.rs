//! The external crawl provider: starting crawls and the callbacks it sends back.

pub mod http;
#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;
pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;

use crate::Error;

pub use http::HttpCrawlProvider;
#[cfg(any(test, feature = "test-helpers"))]
pub use mock::MockCrawlProvider;
pub use webhook::{CrawlWebhook, PageMetadata, WebhookPage};

/// Starts crawls on a third-party crawling service.
#[async_trait]
pub trait CrawlProvider: Send + Sync {
    /// Starts crawling `url`. Cached pages younger than `freshness_hint` may be reused.
    /// The provider reports pages and completion to `callback_target`.
    /// Returns the provider's id for the crawl.
    async fn start(&self, url: &str, freshness_hint: Duration, callback_target: &str) -> Result<String, Error>;
}
