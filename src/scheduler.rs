// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::archive::{ArchiveSink, AUTO_WATCH_FOLDER_NAME};
use crate::config::AutoWatchConfig;
use crate::ingest::types::{Article, LiteratureSource};
use crate::ingest::{build_sources, search_all, search_watch};
use crate::notify::{compose, DigestThrottle, NotificationKind, NotificationSink};
use crate::state::{StateFile, WatchState};
use crate::store::ModuleStore;
use crate::watchlist::{active_watches, WatchItem};

/// Outcome for a single watch within one cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResult {
    pub watch_item: WatchItem,
    pub articles_found: usize,
    pub new_articles: Vec<Article>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub recipient: String,
    pub results: Vec<WatchResult>,
    pub total_found: usize,
    pub total_new: usize,
    pub archived: usize,
    /// What the throttle decided; `None` means nothing was due.
    pub notification: Option<NotificationKind>,
    /// Whether that notification was actually delivered.
    pub notified: bool,
}

#[derive(Debug, Clone)]
struct RunOptions {
    max_results: usize,
    search_limit: usize,
    timeout: Duration,
    max_listed: usize,
    interval: Duration,
    run_on_start: bool,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("autowatch_runs_total", "Completed auto-watch cycles.");
        describe_counter!(
            "autowatch_runs_skipped_total",
            "Timer ticks skipped because a cycle was still running."
        );
        describe_counter!("autowatch_articles_found_total", "Merged articles per watch run.");
        describe_counter!("autowatch_new_articles_total", "Articles classified as new.");
        describe_counter!("autowatch_notifications_total", "Notifications delivered, by kind.");
        describe_counter!("autowatch_notify_errors_total", "Failed notification deliveries.");
        describe_gauge!("autowatch_last_run_ts", "Unix time of the last finished cycle.");
    });
}

/// The auto-watch pipeline: per watch search → novelty → archive, then one
/// throttled notification per cycle.
pub struct AutoWatchService {
    store: Arc<dyn ModuleStore>,
    watch_sources: Vec<Arc<dyn LiteratureSource>>,
    search_sources: Vec<Arc<dyn LiteratureSource>>,
    state: Mutex<WatchState>,
    state_file: StateFile,
    throttle: DigestThrottle,
    archive: ArchiveSink,
    notifier: Arc<dyn NotificationSink>,
    opts: RunOptions,
    // held for the duration of a cycle
    cycle: Mutex<()>,
}

impl AutoWatchService {
    /// HTTP adapters are built from the configured source lists.
    pub fn new(
        cfg: &AutoWatchConfig,
        store: Arc<dyn ModuleStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let watch_sources = build_sources(&cfg.sources.selection.watch, &cfg.sources);
        let search_sources = build_sources(&cfg.sources.selection.search, &cfg.sources);
        Self {
            archive: ArchiveSink::new(
                store.clone(),
                Duration::from_millis(cfg.archive.write_delay_ms),
            ),
            store,
            watch_sources,
            search_sources,
            state: Mutex::new(WatchState::default()),
            state_file: StateFile::in_memory(),
            throttle: DigestThrottle::new(cfg.digest_interval_secs()),
            notifier,
            opts: RunOptions {
                max_results: cfg.sources.max_results,
                search_limit: cfg.sources.search_limit,
                timeout: cfg.sources.timeout(),
                max_listed: cfg.notify.max_listed_per_watch,
                interval: cfg.interval(),
                run_on_start: cfg.schedule.run_on_start,
            },
            cycle: Mutex::new(()),
        }
    }

    /// Replace the adapters (tests, custom deployments).
    pub fn with_sources(
        mut self,
        watch: Vec<Arc<dyn LiteratureSource>>,
        search: Vec<Arc<dyn LiteratureSource>>,
    ) -> Self {
        self.watch_sources = watch;
        self.search_sources = search;
        self
    }

    /// Load any persisted state and keep saving to `file` after each cycle.
    pub async fn with_state_file(mut self, file: StateFile) -> Self {
        self.state = Mutex::new(file.load().await);
        self.state_file = file;
        self
    }

    pub fn store(&self) -> Arc<dyn ModuleStore> {
        self.store.clone()
    }

    pub fn watch_source_names(&self) -> Vec<&'static str> {
        self.watch_sources.iter().map(|s| s.name()).collect()
    }

    pub fn search_source_names(&self) -> Vec<&'static str> {
        self.search_sources.iter().map(|s| s.name()).collect()
    }

    pub async fn state_snapshot(&self) -> WatchState {
        self.state.lock().await.clone()
    }

    pub async fn run_cycle(&self, recipient: &str) -> CycleReport {
        self.run_cycle_at(recipient, Utc::now()).await
    }

    /// One full cycle evaluated as of `now`. Waits for any cycle already in
    /// flight.
    pub async fn run_cycle_at(&self, recipient: &str, now: DateTime<Utc>) -> CycleReport {
        let _guard = self.cycle.lock().await;
        self.cycle_locked(recipient, now).await
    }

    /// Manual trigger: queues behind a running cycle, returns once its own
    /// cycle, notification included, has finished.
    pub async fn force_run(&self, recipient: &str) -> CycleReport {
        tracing::info!(target: "autowatch", recipient, "forced run requested");
        self.run_cycle(recipient).await
    }

    /// Free-text search across the search source list, merged.
    pub async fn search_literature(&self, query: &str, limit: Option<usize>) -> Vec<Article> {
        let q = query.trim();
        if q.is_empty() {
            return Vec::new();
        }
        let limit = limit.unwrap_or(self.opts.search_limit).clamp(1, 100);
        search_all(&self.search_sources, q, limit, self.opts.timeout).await
    }

    /// Run immediately (if configured) and then every interval. A tick that
    /// lands while a cycle is still running is skipped.
    pub fn spawn(self: Arc<Self>, recipient: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.opts.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            if !self.opts.run_on_start {
                ticker.tick().await;
            }
            tracing::info!(
                target: "autowatch",
                interval_secs = self.opts.interval.as_secs(),
                sources = ?self.watch_source_names(),
                "auto-watch scheduler started"
            );
            loop {
                ticker.tick().await;
                let Ok(_guard) = self.cycle.try_lock() else {
                    ensure_metrics_described();
                    counter!("autowatch_runs_skipped_total").increment(1);
                    tracing::info!(target: "autowatch", "previous cycle still running; tick skipped");
                    continue;
                };
                self.cycle_locked(&recipient, Utc::now()).await;
            }
        })
    }

    async fn cycle_locked(&self, recipient: &str, now: DateTime<Utc>) -> CycleReport {
        ensure_metrics_described();
        let mut report = CycleReport {
            started_at: now,
            recipient: recipient.to_string(),
            results: Vec::new(),
            total_found: 0,
            total_new: 0,
            archived: 0,
            notification: None,
            notified: false,
        };

        let watches = active_watches(self.store.as_ref()).await;
        if watches.is_empty() {
            tracing::debug!(target: "autowatch", "no active watches; nothing to do");
            return report;
        }

        for watch in watches {
            let articles = search_watch(
                &self.watch_sources,
                &watch,
                self.opts.max_results,
                self.opts.timeout,
            )
            .await;

            let fresh = self
                .state
                .lock()
                .await
                .novelty
                .classify_and_record(&articles, &watch.key());

            let archived = self.archive.archive_all(&articles, now).await;

            counter!("autowatch_articles_found_total").increment(articles.len() as u64);
            counter!("autowatch_new_articles_total").increment(fresh.len() as u64);
            tracing::info!(
                target: "autowatch",
                watch = %watch.key(),
                found = articles.len(),
                new = fresh.len(),
                archived,
                "watch processed"
            );

            report.total_found += articles.len();
            report.total_new += fresh.len();
            report.archived += archived;
            report.results.push(WatchResult {
                watch_item: watch,
                articles_found: articles.len(),
                new_articles: fresh,
                timestamp: now,
            });
        }

        let decision = {
            let st = self.state.lock().await;
            self.throttle
                .decide(&st.last_email, recipient, report.total_new, now)
        };
        report.notification = decision;

        if let Some(kind) = decision {
            let (subject, body) = match kind {
                NotificationKind::NewArticles => compose::new_articles_email(
                    &report.results,
                    now,
                    self.opts.max_listed,
                    AUTO_WATCH_FOLDER_NAME,
                ),
                NotificationKind::Digest => compose::digest_email(&report.results, now),
            };
            match self.notifier.deliver(recipient, &subject, &body).await {
                Ok(()) => {
                    self.state.lock().await.last_email.record(recipient, now);
                    counter!("autowatch_notifications_total", "kind" => kind.as_str())
                        .increment(1);
                    report.notified = true;
                }
                Err(e) => {
                    tracing::warn!(error = ?e, recipient, kind = kind.as_str(), "notification failed");
                    counter!("autowatch_notify_errors_total").increment(1);
                }
            }
        } else {
            tracing::debug!(target: "autowatch", recipient, "digest withheld; last email too recent");
        }

        {
            let st = self.state.lock().await;
            self.state_file.save(&st).await;
        }

        counter!("autowatch_runs_total").increment(1);
        gauge!("autowatch_last_run_ts").set(now.timestamp() as f64);
        tracing::info!(
            target: "autowatch",
            watches = report.results.len(),
            found = report.total_found,
            new = report.total_new,
            archived = report.archived,
            notification = ?report.notification.map(|k| k.as_str()),
            notified = report.notified,
            "cycle complete"
        );
        report
    }
}
