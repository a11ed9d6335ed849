use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CrawlProvider;
use crate::Error;

const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev";

/// Webhook events the provider should send back.
const WEBHOOK_EVENTS: [&str; 3] = ["page", "completed", "failed"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartCrawlRequest<'a> {
    url: &'a str,
    /// Milliseconds a cached page may be old and still be reused.
    max_age: u64,
    webhook: WebhookConfig<'a>,
    scrape_options: ScrapeOptions,
}

#[derive(Debug, Serialize)]
struct WebhookConfig<'a> {
    url: &'a str,
    events: [&'static str; 3],
}

#[derive(Debug, Serialize)]
struct ScrapeOptions {
    formats: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct StartCrawlResponse {
    #[serde(default)]
    success: bool,
    id: Option<String>,
    error: Option<String>,
}

/// HTTP client for a Firecrawl-compatible crawl API.
pub struct HttpCrawlProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCrawlProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Uses CRAWL_API_URL and CRAWL_API_KEY.
    pub fn from_env() -> Self {
        let base_url = std::env::var("CRAWL_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("CRAWL_API_KEY").ok().filter(|k| !k.trim().is_empty());
        Self::new(&base_url, api_key)
    }
}

#[async_trait]
impl CrawlProvider for HttpCrawlProvider {
    async fn start(&self, url: &str, freshness_hint: Duration, callback_target: &str) -> Result<String, Error> {
        let body = StartCrawlRequest {
            url,
            max_age: freshness_hint.as_millis() as u64,
            webhook: WebhookConfig {
                url: callback_target,
                events: WEBHOOK_EVENTS,
            },
            scrape_options: ScrapeOptions { formats: ["markdown"] },
        };

        let mut request = self.client.post(format!("{}/v1/crawl", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::ProviderRejected {
                status: status.as_u16(),
                message,
            });
        }

        let started: StartCrawlResponse = resp.json().await?;
        match started.id {
            Some(id) if started.success => {
                tracing::debug!(crawl_id = %id, url, "Crawl started");
                Ok(id)
            }
            _ => Err(Error::ProviderRejected {
                status: status.as_u16(),
                message: started
                    .error
                    .unwrap_or_else(|| "crawl provider did not return a crawl id".to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = StartCrawlRequest {
            url: "https://example.com",
            max_age: Duration::from_secs(60).as_millis() as u64,
            webhook: WebhookConfig {
                url: "https://hooks.example.org/api/webhook/crawl/1",
                events: WEBHOOK_EVENTS,
            },
            scrape_options: ScrapeOptions { formats: ["markdown"] },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["maxAge"], 60_000);
        assert_eq!(json["webhook"]["url"], "https://hooks.example.org/api/webhook/crawl/1");
        assert_eq!(json["webhook"]["events"][1], "completed");
        assert_eq!(json["scrapeOptions"]["formats"][0], "markdown");
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let provider = HttpCrawlProvider::new("http://localhost:3002/", None);
        assert_eq!(provider.base_url, "http://localhost:3002");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_retriable() {
        // nothing listens on port 9 (discard) in test environments
        let provider = HttpCrawlProvider::new("http://127.0.0.1:9", None);
        let err = provider
            .start("https://example.com", Duration::ZERO, "http://localhost/cb")
            .await
            .unwrap_err();
        assert!(err.is_retriable(), "unexpected error: {}", err);
    }
}
