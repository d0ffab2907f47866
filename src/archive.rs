//! Append-only archive of everything the auto-watch finds.
//!
//! Each archived article gets a fresh id even when the same paper was filed
//! on an earlier run, so the archive reads as a log of discoveries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::ingest::types::Article;
use crate::store::{ModuleStore, ARCHIVE, FOLDERS};

pub const AUTO_WATCH_FOLDER_ID: &str = "auto-watch";
pub const AUTO_WATCH_FOLDER_NAME: &str = "Auto-Watch";

pub struct ArchiveSink {
    store: Arc<dyn ModuleStore>,
    write_delay: Duration,
    // serializes check-then-create; the store is re-checked every time
    folder_lock: Mutex<()>,
}

impl ArchiveSink {
    pub fn new(store: Arc<dyn ModuleStore>, write_delay: Duration) -> Self {
        Self {
            store,
            write_delay,
            folder_lock: Mutex::new(()),
        }
    }

    /// Create the auto-watch folder unless it already exists. The save is an
    /// upsert on the fixed id, so a concurrent creator elsewhere only
    /// rewrites the same record. A folder deleted through the shared store
    /// is recreated on the next call.
    pub async fn ensure_folder(&self) -> Result<()> {
        let _guard = self.folder_lock.lock().await;
        let folders = self.store.fetch(FOLDERS).await.context("fetching folders")?;
        let exists = folders
            .iter()
            .any(|f| f.get("id").and_then(Value::as_str) == Some(AUTO_WATCH_FOLDER_ID));
        if !exists {
            let folder = serde_json::json!({
                "id": AUTO_WATCH_FOLDER_ID,
                "name": AUTO_WATCH_FOLDER_NAME,
                "description": "Articles discovered by the literature auto-watch",
                "createdAt": Utc::now(),
            });
            self.store
                .save(FOLDERS, folder)
                .await
                .context("creating auto-watch folder")?;
            tracing::info!(folder = AUTO_WATCH_FOLDER_ID, "auto-watch folder created");
        }
        Ok(())
    }

    /// Write every article as a new archive record. Failed writes are logged
    /// and skipped. Returns how many records were written.
    pub async fn archive_all(&self, articles: &[Article], now: DateTime<Utc>) -> usize {
        if articles.is_empty() {
            return 0;
        }
        if let Err(e) = self.ensure_folder().await {
            tracing::warn!(error = ?e, "auto-watch folder check failed; archiving anyway");
        }

        let mut written = 0;
        for (i, a) in articles.iter().enumerate() {
            if i > 0 && !self.write_delay.is_zero() {
                tokio::time::sleep(self.write_delay).await;
            }
            match self.archive_one(a, now).await {
                Ok(()) => {
                    written += 1;
                    metrics::counter!("autowatch_archived_total").increment(1);
                }
                Err(e) => {
                    tracing::warn!(error = ?e, title = %a.title, "archive write failed");
                    metrics::counter!("autowatch_archive_errors_total").increment(1);
                }
            }
        }
        written
    }

    async fn archive_one(&self, article: &Article, now: DateTime<Utc>) -> Result<()> {
        let record = archive_record(article, now)?;
        self.store.save(ARCHIVE, record).await?;
        Ok(())
    }

    pub async fn archived(&self) -> Result<Vec<Value>> {
        let rows = self.store.fetch(ARCHIVE).await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.get("folderId").and_then(Value::as_str) == Some(AUTO_WATCH_FOLDER_ID))
            .collect())
    }
}

/// The article's own fields plus id, dateAdded, folderId and autoArchived.
pub fn archive_record(article: &Article, now: DateTime<Utc>) -> Result<Value> {
    let mut v = serde_json::to_value(article)?;
    let obj = v
        .as_object_mut()
        .ok_or_else(|| anyhow!("article did not serialize to an object"))?;
    obj.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
    obj.insert("dateAdded".into(), serde_json::to_value(now)?);
    obj.insert("folderId".into(), Value::String(AUTO_WATCH_FOLDER_ID.into()));
    obj.insert("autoArchived".into(), Value::Bool(true));
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashSet;

    fn art(title: &str) -> Article {
        Article {
            title: title.into(),
            source: "PubMed".into(),
            ..Default::default()
        }
    }

    /// Rejects archive writes, passes everything else through.
    struct NoArchive(MemoryStore);

    #[async_trait::async_trait]
    impl ModuleStore for NoArchive {
        async fn fetch(&self, c: &str) -> Result<Vec<Value>> {
            self.0.fetch(c).await
        }
        async fn save(&self, c: &str, r: Value) -> Result<Value> {
            if c == ARCHIVE {
                return Err(anyhow!("disk full"));
            }
            self.0.save(c, r).await
        }
        async fn delete(&self, c: &str, id: &str) -> Result<()> {
            self.0.delete(c, id).await
        }
    }

    #[test]
    fn record_carries_provenance() {
        let rec = archive_record(&art("Radium"), Utc::now()).unwrap();
        assert_eq!(rec["title"], "Radium");
        assert_eq!(rec["folderId"], AUTO_WATCH_FOLDER_ID);
        assert_eq!(rec["autoArchived"], true);
        assert!(rec["dateAdded"].is_string());
        assert!(rec["id"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn same_article_twice_gets_two_ids() {
        let store = Arc::new(MemoryStore::new());
        let sink = ArchiveSink::new(store.clone(), Duration::ZERO);
        let batch = vec![art("A"), art("B")];
        assert_eq!(sink.archive_all(&batch, Utc::now()).await, 2);
        assert_eq!(sink.archive_all(&batch, Utc::now()).await, 2);

        let rows = sink.archived().await.unwrap();
        assert_eq!(rows.len(), 4);
        let ids: HashSet<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn folder_created_once() {
        let store = Arc::new(MemoryStore::new());
        let sink = ArchiveSink::new(store.clone(), Duration::ZERO);
        sink.ensure_folder().await.unwrap();
        sink.ensure_folder().await.unwrap();
        // a second sink sees the existing folder
        ArchiveSink::new(store.clone(), Duration::ZERO)
            .ensure_folder()
            .await
            .unwrap();
        let folders = store.fetch(FOLDERS).await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0]["name"], AUTO_WATCH_FOLDER_NAME);
    }

    #[tokio::test]
    async fn deleted_folder_is_recreated() {
        let store = Arc::new(MemoryStore::new());
        let sink = ArchiveSink::new(store.clone(), Duration::ZERO);
        sink.archive_all(&[art("A")], Utc::now()).await;
        store.delete(FOLDERS, AUTO_WATCH_FOLDER_ID).await.unwrap();
        assert!(store.fetch(FOLDERS).await.unwrap().is_empty());

        sink.archive_all(&[art("B")], Utc::now()).await;
        let folders = store.fetch(FOLDERS).await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0]["id"], AUTO_WATCH_FOLDER_ID);
    }

    #[tokio::test]
    async fn write_failures_are_skipped() {
        let sink = ArchiveSink::new(Arc::new(NoArchive(MemoryStore::new())), Duration::ZERO);
        assert_eq!(sink.archive_all(&[art("A"), art("B")], Utc::now()).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_are_spaced_out() {
        let sink = ArchiveSink::new(Arc::new(MemoryStore::new()), Duration::from_millis(50));
        let start = tokio::time::Instant::now();
        sink.archive_all(&[art("A"), art("B"), art("C")], Utc::now()).await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
