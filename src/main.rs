//! Literature Auto-Watch: binary entrypoint
//! Boots the Axum HTTP server, starts the hourly watch scheduler, and wires
//! the module store, notification sinks and Prometheus metrics.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;

use lab_autowatch::config::AutoWatchConfig;
use lab_autowatch::metrics::Metrics;
use lab_autowatch::state::StateFile;
use lab_autowatch::store::{JsonFileStore, ModuleStore};
use lab_autowatch::{create_router, init_tracing, AppState, AutoWatchService, NotifierMux};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AutoWatchConfig::load_default()
        .map_err(|e| shuttle_runtime::Error::Custom(e.context("loading autowatch config")))?;

    let store: Arc<dyn ModuleStore> = Arc::new(JsonFileStore::new(&cfg.store.data_dir));
    let notifier = Arc::new(NotifierMux::from_config(&cfg.notify, store.clone()));
    tracing::info!(sinks = ?notifier.sink_names(), data_dir = %cfg.store.data_dir.display(), "notification sinks ready");

    let service = Arc::new(
        AutoWatchService::new(&cfg, store, notifier)
            .with_state_file(StateFile::new(cfg.store.state_path.clone()))
            .await,
    );

    // Runs once immediately, then every interval.
    let _scheduler = service.clone().spawn(cfg.notify.recipient.clone());

    let mut router = create_router(AppState::new(service, cfg.notify.recipient.clone()));
    match Metrics::init(cfg.schedule.interval_secs) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(router.into())
}
