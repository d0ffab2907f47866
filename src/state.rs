use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::notify::LastEmailLog;
use crate::novelty::NoveltyTracker;

/// Process-local memory of the auto-watch: previous-run snapshots and the
/// last notification time per recipient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchState {
    #[serde(default)]
    pub novelty: NoveltyTracker,
    #[serde(default)]
    pub last_email: LastEmailLog,
}

/// Optional JSON persistence for [`WatchState`]. Without a path everything
/// stays in memory and is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct StateFile {
    path: Option<PathBuf>,
}

impl StateFile {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Missing or unreadable files give an empty state.
    pub async fn load(&self) -> WatchState {
        let Some(p) = &self.path else {
            return WatchState::default();
        };
        match fs::read_to_string(p).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(path = %p.display(), "state parse: {e:#}");
                WatchState::default()
            }),
            Err(_) => WatchState::default(),
        }
    }

    pub async fn save(&self, state: &WatchState) {
        let Some(p) = &self.path else {
            return;
        };
        if let Some(dir) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(dir).await {
                tracing::warn!("state dir: {e:#}");
            }
        }
        let bytes = match serde_json::to_vec_pretty(state) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("encode state: {e:#}");
                return;
            }
        };
        if let Err(e) = fs::write(p, bytes).await {
            tracing::warn!("write state: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Article;
    use chrono::Utc;

    #[tokio::test]
    async fn in_memory_is_always_empty() {
        let f = StateFile::in_memory();
        let mut st = f.load().await;
        st.last_email.record("lab-admin", Utc::now());
        f.save(&st).await;
        assert!(f.load().await.last_email.last_sent("lab-admin").is_none());
    }

    #[tokio::test]
    async fn file_round_trip_keeps_snapshots() {
        let tmp = tempfile::tempdir().unwrap();
        let f = StateFile::new(Some(tmp.path().join("nested/state.json")));

        let mut st = WatchState::default();
        let a = Article {
            title: "Graphene".into(),
            doi: "10.1/x".into(),
            ..Default::default()
        };
        st.novelty.classify_and_record(&[a.clone()], "keyword-graphene");
        f.save(&st).await;

        let back = f.load().await;
        assert!(!back.novelty.is_new(&a, "keyword-graphene"));
        assert!(back.novelty.has_snapshot("keyword-graphene"));
    }

    #[tokio::test]
    async fn garbage_file_gives_default() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("state.json");
        tokio::fs::write(&p, "not json").await.unwrap();
        let st = StateFile::new(Some(p)).load().await;
        assert!(!st.novelty.has_snapshot("x"));
    }
}
