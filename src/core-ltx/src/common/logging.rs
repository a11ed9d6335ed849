use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sets the logging (tracing) level using RUST_LOG, falling back to the supplied default log settings.
/// Later calls keep the first subscriber.
pub fn setup_logging(default_log_settings: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_settings));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
    if installed.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

/// Default filter for a service: the service's own crate plus the pipeline crates at `level`.
pub fn default_log_filter(service_crate: &str, level: &str) -> String {
    format!(
        "{service}={level},worker_ltx={level},core_ltx={level},data_model_ltx={level},tower_http=info",
        service = service_crate,
        level = level
    )
}
