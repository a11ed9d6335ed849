//! Mock crawl provider for testing

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::CrawlProvider;
use crate::Error;

/// A crawl start request as seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedCrawl {
    pub url: String,
    pub freshness_hint: Duration,
    pub callback_target: String,
}

/// Mock crawl provider
///
/// Hands out `crawl-1`, `crawl-2`, ... and can be scripted to fail the next N calls.
#[derive(Default)]
pub struct MockCrawlProvider {
    failures: Mutex<VecDeque<u16>>,
    always_fail: Option<u16>,
    calls: Mutex<Vec<StartedCrawl>>,
}

impl MockCrawlProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `times` calls with `status`, then succeed.
    pub fn failing_times(times: usize, status: u16) -> Self {
        Self {
            failures: Mutex::new(std::iter::repeat_n(status, times).collect()),
            ..Self::default()
        }
    }

    /// Reject every call with `status`.
    pub fn always_failing(status: u16) -> Self {
        Self {
            always_fail: Some(status),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<StartedCrawl> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl CrawlProvider for MockCrawlProvider {
    async fn start(&self, url: &str, freshness_hint: Duration, callback_target: &str) -> Result<String, Error> {
        let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
        calls.push(StartedCrawl {
            url: url.to_string(),
            freshness_hint,
            callback_target: callback_target.to_string(),
        });

        let scripted = self.failures.lock().unwrap_or_else(|p| p.into_inner()).pop_front();
        if let Some(status) = scripted.or(self.always_fail) {
            return Err(Error::ProviderRejected {
                status,
                message: "Mock crawl provider configured to fail".to_string(),
            });
        }
        Ok(format!("crawl-{}", calls.len()))
    }
}
