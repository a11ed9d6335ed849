use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::Error;

/// Anything that can start a recrawl of a domain.
#[async_trait]
pub trait Recrawler: Send + Sync {
    async fn recrawl(&self, hostname: &str) -> Result<Uuid, Error>;
}

#[derive(Debug, Serialize)]
struct RecrawlRequest<'a> {
    hostname: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobIdResponse {
    job_id: Uuid,
}

/// Talks to the API server's recrawl endpoint.
pub struct ApiClient {
    client: Client,
    api_base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Recrawler for ApiClient {
    /// POST /api/recrawl. A 409 means the domain is already being crawled.
    async fn recrawl(&self, hostname: &str) -> Result<Uuid, Error> {
        let endpoint = format!("{}/api/recrawl", self.api_base_url);
        debug!("Requesting recrawl of '{}'", hostname);

        let response = self
            .client
            .post(&endpoint)
            .json(&RecrawlRequest { hostname })
            .send()
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Err(Error::JobInProgress),
            status if status.is_success() => {
                let body: JobIdResponse = response.json().await?;
                Ok(body.job_id)
            }
            status => Err(Error::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
