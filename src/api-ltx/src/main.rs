use std::sync::Arc;

use anyhow::Context;
use core_ltx::blob::FsObjectStore;
use core_ltx::crawl::HttpCrawlProvider;
use core_ltx::llms::{ChatGpt, ChatGptSummarizer, Summarizer};
use core_ltx::{default_log_filter, get_api_base_url, get_db_pool, setup_logging};
use data_model_ltx::store::PgStore;
use worker_ltx::{Collaborators, Pipeline, PipelineConfig};

use api_ltx::{AppState, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    setup_logging(&default_log_filter("api_ltx", "debug"));

    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;

    let summarizer: Option<Arc<dyn Summarizer>> = if config.summarize_pages {
        Some(Arc::new(ChatGptSummarizer::new(ChatGpt::new())))
    } else {
        tracing::info!("Page summaries disabled");
        None
    };
    let objects = Arc::new(FsObjectStore::from_env());
    let collaborators = Collaborators {
        store: Arc::new(PgStore::new(get_db_pool().await)),
        objects: objects.clone(),
        crawler: Arc::new(HttpCrawlProvider::from_env()),
        summarizer,
    };

    let (pipeline, dispatcher) = Pipeline::build(collaborators, config);
    tokio::spawn(dispatcher.run());

    let state = AppState::new(pipeline, objects, std::env::var("WEBHOOK_SECRET").ok());
    if state.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET is not set, crawl callbacks are accepted unsigned");
    }
    let app = routes::router().with_state(state);

    let addr = get_api_base_url().context("Invalid HOST or PORT")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
