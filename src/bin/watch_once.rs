//! Runs a single auto-watch cycle against the configured data dir and prints
//! the report. Extra args `type:value` (e.g. `keyword:graphene`) are added to
//! the watch list first.

use std::sync::Arc;

use anyhow::{anyhow, Result};

use lab_autowatch::config::AutoWatchConfig;
use lab_autowatch::state::StateFile;
use lab_autowatch::store::{JsonFileStore, ModuleStore};
use lab_autowatch::watchlist::{add_watch, AddOutcome};
use lab_autowatch::{init_tracing, AutoWatchService, NotifierMux, WatchItem, WatchType};

fn parse_watch(arg: &str) -> Result<WatchItem> {
    let (kind, value) = arg
        .split_once(':')
        .ok_or_else(|| anyhow!("expected type:value, got {arg:?}"))?;
    let kind = match kind.to_ascii_lowercase().as_str() {
        "author" => WatchType::Author,
        "keyword" => WatchType::Keyword,
        "orcid" => WatchType::Orcid,
        other => return Err(anyhow!("unknown watch type {other:?}")),
    };
    Ok(WatchItem::new(kind, value.trim()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AutoWatchConfig::load_default()?;
    let store: Arc<dyn ModuleStore> = Arc::new(JsonFileStore::new(&cfg.store.data_dir));

    for arg in std::env::args().skip(1) {
        match add_watch(store.as_ref(), parse_watch(&arg)?).await? {
            AddOutcome::Added(w) => println!("added watch {}", w.item.key()),
            AddOutcome::Duplicate(w) => println!("already watching {}", w.item.key()),
        }
    }

    let notifier = Arc::new(NotifierMux::from_config(&cfg.notify, store.clone()));
    let service = AutoWatchService::new(&cfg, store, notifier)
        .with_state_file(StateFile::new(cfg.store.state_path.clone()))
        .await;

    let report = service.force_run(&cfg.notify.recipient).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
