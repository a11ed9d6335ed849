//! Callback payloads sent by the crawl provider.
//!
//! ```json
//! { "success": true, "type": "crawl.page", "id": "crawl-123",
//!   "data": [{ "markdown": "# Hi", "metadata": { "sourceURL": "https://example.com/", "title": "Hi" } }] }
//! ```

use serde::{Deserialize, Serialize};

pub const EVENT_STARTED: &str = "crawl.started";
pub const EVENT_PAGE: &str = "crawl.page";
pub const EVENT_COMPLETED: &str = "crawl.completed";
pub const EVENT_FAILED: &str = "crawl.failed";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(rename = "sourceURL", alias = "url", default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "statusCode", default)]
    pub status_code: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookPage {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub metadata: PageMetadata,
}

impl WebhookPage {
    /// The page's content, preferring markdown over HTML.
    pub fn content(&self) -> Option<&str> {
        self.markdown
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .or(self.html.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlWebhook {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(rename = "type")]
    pub event_type: String,
    /// The provider's crawl id.
    pub id: String,
    #[serde(default)]
    pub data: Vec<WebhookPage>,
    #[serde(default)]
    pub error: Option<String>,
    /// Pages the provider says it crawled, when it reports a count on completion.
    #[serde(default)]
    pub total: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_event() {
        let raw = r##"{
            "success": true,
            "type": "crawl.page",
            "id": "crawl-123",
            "data": [{
                "markdown": "# Welcome",
                "metadata": { "sourceURL": "https://example.com/", "title": "Welcome", "statusCode": 200 }
            }]
        }"##;
        let hook: CrawlWebhook = serde_json::from_str(raw).unwrap();
        assert_eq!(hook.event_type, EVENT_PAGE);
        assert_eq!(hook.id, "crawl-123");
        assert_eq!(hook.data.len(), 1);
        assert_eq!(hook.data[0].content(), Some("# Welcome"));
        assert_eq!(hook.data[0].metadata.source_url.as_deref(), Some("https://example.com/"));
        assert_eq!(hook.data[0].metadata.status_code, Some(200));
    }

    #[test]
    fn test_parse_completed_without_data() {
        let hook: CrawlWebhook =
            serde_json::from_str(r#"{"type": "crawl.completed", "id": "c1", "total": 0}"#).unwrap();
        assert_eq!(hook.event_type, EVENT_COMPLETED);
        assert!(hook.data.is_empty());
        assert_eq!(hook.total, Some(0));
    }

    #[test]
    fn test_html_used_when_markdown_missing() {
        let page = WebhookPage {
            markdown: Some("  ".into()),
            html: Some("<p>hi</p>".into()),
            metadata: PageMetadata::default(),
        };
        assert_eq!(page.content(), Some("<p>hi</p>"));
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(serde_json::from_str::<CrawlWebhook>(r#"{"id": "c1"}"#).is_err());
    }
}
