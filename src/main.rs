//! Outbreak tracker service entrypoint.
//! Boots the Axum HTTP server with the classifier handle, hot reload and /metrics.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use outbreak_tracker::api::{self, AppState};
use outbreak_tracker::classifier::{
    dev_logging_enabled, start_hot_reload_thread, ClassifierHandle,
};
use outbreak_tracker::config::{resolve_tables_path, DEFAULT_TABLES_PATH};
use outbreak_tracker::metrics::Metrics;
use outbreak_tracker::HeadlineClassifier;

/// Compact tracing logs in development only (see [`dev_logging_enabled`]).
fn enable_dev_tracing() {
    if !dev_logging_enabled() {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("outbreak=info,warn"));

    // Shuttle may already own the global subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let classifier = HeadlineClassifier::from_default_config()?;
    let handle = ClassifierHandle::new(classifier);

    // Watch whichever file the tables came from; the embedded copy has nothing to watch.
    let path = resolve_tables_path()?;
    if let Some(path) = path {
        start_hot_reload_thread(handle.clone(), path);
    } else {
        tracing::info!(
            target: "outbreak::config",
            default = DEFAULT_TABLES_PATH,
            "no tables file on disk; hot reload disabled"
        );
    }

    let metrics = Metrics::init()?;
    let router = api::router(AppState::new(handle)).merge(metrics.router());

    Ok(router.into())
}
