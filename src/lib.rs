// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod archive;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod novelty;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod watchlist;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AutoWatchConfig;
pub use crate::ingest::types::{Article, LiteratureSource};
pub use crate::notify::{NotificationSink, NotifierMux};
pub use crate::scheduler::{AutoWatchService, CycleReport, WatchResult};
pub use crate::store::{JsonFileStore, MemoryStore, ModuleStore};
pub use crate::watchlist::{WatchItem, WatchType};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. `AUTOWATCH_LOG_JSON=1` switches to
/// JSON lines. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lab_autowatch=info,autowatch=info,warn"));

    let json = std::env::var("AUTOWATCH_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
