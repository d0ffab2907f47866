// src/config/autowatch.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::config::SourceSelection;

pub const DEFAULT_CONFIG_PATH: &str = "config/autowatch.toml";
pub const ENV_CONFIG_PATH: &str = "AUTOWATCH_CONFIG_PATH";
/// Upper bound for the digest window: ten years.
pub const MAX_DIGEST_HOURS: u64 = 10 * 365 * 24;

fn default_interval_secs() -> u64 {
    3600
}
fn default_true() -> bool {
    true
}
fn default_max_results() -> usize {
    10
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_write_delay_ms() -> u64 {
    50
}
fn default_recipient() -> String {
    "lab-admin".to_string()
}
fn default_sender() -> String {
    "Auto-Watch".to_string()
}
fn default_digest_hours() -> u64 {
    24
}
fn default_max_listed() -> usize {
    5
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleCfg {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesCfg {
    #[serde(flatten)]
    pub selection: SourceSelection,
    /// Per-source result cap for watch runs.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Per-source result cap for interactive search.
    #[serde(default = "default_max_results")]
    pub search_limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sent to CrossRef (`mailto`) and in the User-Agent.
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub pubmed_api_key: Option<String>,
}

impl Default for SourcesCfg {
    fn default() -> Self {
        Self {
            selection: SourceSelection::default(),
            max_results: default_max_results(),
            search_limit: default_max_results(),
            timeout_secs: default_timeout_secs(),
            contact_email: None,
            pubmed_api_key: None,
        }
    }
}

impl SourcesCfg {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn user_agent(&self) -> String {
        match &self.contact_email {
            Some(m) => format!("lab-autowatch/{} (mailto:{m})", env!("CARGO_PKG_VERSION")),
            None => format!("lab-autowatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveCfg {
    /// Pause between successive archive writes.
    #[serde(default = "default_write_delay_ms")]
    pub write_delay_ms: u64,
}

impl Default for ArchiveCfg {
    fn default() -> Self {
        Self {
            write_delay_ms: default_write_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyCfg {
    /// Recipient for scheduled runs.
    #[serde(default = "default_recipient")]
    pub recipient: String,
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default = "default_digest_hours")]
    pub digest_interval_hours: u64,
    #[serde(default = "default_max_listed")]
    pub max_listed_per_watch: usize,
    /// Also deliver by SMTP (needs SMTP_* env vars).
    #[serde(default)]
    pub smtp: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for NotifyCfg {
    fn default() -> Self {
        Self {
            recipient: default_recipient(),
            sender: default_sender(),
            digest_interval_hours: default_digest_hours(),
            max_listed_per_watch: default_max_listed(),
            smtp: false,
            webhook_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCfg {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// When set, novelty snapshots and last-email times survive restarts.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            state_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoWatchConfig {
    #[serde(default)]
    pub schedule: ScheduleCfg,
    #[serde(default)]
    pub sources: SourcesCfg,
    #[serde(default)]
    pub archive: ArchiveCfg,
    #[serde(default)]
    pub notify: NotifyCfg,
    #[serde(default)]
    pub store: StoreCfg,
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AutoWatchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AutoWatchConfig = toml::from_str(s).context("parsing autowatch toml")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading autowatch config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolution order:
    /// 1) $AUTOWATCH_CONFIG_PATH (must exist)
    /// 2) config/autowatch.toml
    /// 3) built-in defaults
    ///
    /// Env overrides are applied on top.
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default().sanitized()
            }
        };
        Ok(base.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_nonempty("AUTOWATCH_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.schedule.interval_secs = v;
        }
        if let Some(v) = env_nonempty("AUTOWATCH_RECIPIENT") {
            self.notify.recipient = v;
        }
        if let Some(v) = env_nonempty("AUTOWATCH_DATA_DIR") {
            self.store.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_nonempty("AUTOWATCH_STATE_PATH") {
            self.store.state_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env_nonempty("PUBMED_API_KEY") {
            self.sources.pubmed_api_key = Some(v);
        }
        if let Some(v) = env_nonempty("CROSSREF_MAILTO") {
            self.sources.contact_email = Some(v);
        }
        if let Some(v) = env_nonempty("NOTIFY_WEBHOOK_URL") {
            self.notify.webhook_url = Some(v);
        }
        self.sanitized()
    }

    fn sanitized(mut self) -> Self {
        self.schedule.interval_secs = self.schedule.interval_secs.max(1);
        self.sources.selection = self.sources.selection.cleaned();
        self.sources.max_results = self.sources.max_results.clamp(1, 100);
        self.sources.search_limit = self.sources.search_limit.clamp(1, 100);
        self.sources.timeout_secs = self.sources.timeout_secs.max(1);
        self.notify.max_listed_per_watch = self.notify.max_listed_per_watch.max(1);
        self.notify.digest_interval_hours = self.notify.digest_interval_hours.min(MAX_DIGEST_HOURS);
        if self.notify.recipient.trim().is_empty() {
            self.notify.recipient = default_recipient();
        }
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }

    pub fn digest_interval_secs(&self) -> i64 {
        let hours = self.notify.digest_interval_hours.min(MAX_DIGEST_HOURS);
        i64::try_from(hours * 3600).unwrap_or(i64::MAX)
    }
}
