use std::sync::Arc;
use std::time::Duration;

use core_ltx::{TimeUnit, default_log_filter, get_api_base_url, get_db_pool, get_poll_interval, setup_logging};
use cron_ltx::{ApiClient, Recrawler, SweepConfig, schedule_recrawls, sweep_stale_jobs};
use data_model_ltx::store::PgStore;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file, if it exists
    dotenvy::dotenv().ok();

    setup_logging(&default_log_filter("cron_ltx", "debug"));

    let store = PgStore::new(get_db_pool().await);

    let poll_interval = get_poll_interval(TimeUnit::Seconds, "CRON_POLL_INTERVAL_S", 300);
    let sweep_config = SweepConfig {
        empty_crawl_grace: get_poll_interval(TimeUnit::Seconds, "EMPTY_CRAWL_GRACE_S", 600),
        job_timeout: get_poll_interval(TimeUnit::Seconds, "JOB_TIMEOUT_S", 6 * 60 * 60),
    };

    let api_base_url = match get_api_base_url() {
        Ok(addr) => format!("http://{}", addr),
        Err(e) => panic!("Invalid HOST or PORT: {}", e),
    };
    let http_client = match reqwest::Client::builder().timeout(Duration::from_secs(30)).build() {
        Ok(client) => client,
        Err(e) => panic!("Failed to build HTTP client: {}", e),
    };
    let recrawler: Arc<dyn Recrawler> = Arc::new(ApiClient::new(http_client, api_base_url.clone()));

    tracing::info!(
        "Cron service started against {}, polling every {:?} (empty crawl grace {:?}, job timeout {:?})",
        api_base_url,
        poll_interval,
        sweep_config.empty_crawl_grace,
        sweep_config.job_timeout
    );

    loop {
        let now = chrono::Utc::now();

        match sweep_stale_jobs(&store, &sweep_config, now).await {
            Ok(failed) if !failed.is_empty() => tracing::info!("Failed {} stale jobs", failed.len()),
            Ok(_) => {}
            Err(e) => tracing::error!("Error sweeping stale jobs: {}", e),
        }

        match schedule_recrawls(&store, &recrawler, now).await {
            Ok(started) => tracing::info!("Started {} recrawls", started),
            Err(e) => tracing::error!("Error scheduling recrawls: {}", e),
        }

        tracing::debug!("Sleeping for {:?} until next poll", poll_interval);
        tokio::time::sleep(poll_interval).await;
    }
}
