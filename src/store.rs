//! # Module store
//! Generic key-value persistence used by every lab module: named collections
//! of JSON records, upserted by their `id` field.
//!
//! Two implementations ship here: an in-memory store (tests, demos) and a
//! JSON-file store with one file per collection. The file store suits a
//! single-process development or demo deployment: every change rewrites the
//! whole collection file, so large append-heavy collections belong in a real
//! database behind this trait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tokio::{fs, sync::Mutex};

pub const WATCH_ITEMS: &str = "autowatch_items";
pub const FOLDERS: &str = "literature_folders";
pub const ARCHIVE: &str = "literature_articles";
pub const MESSAGES: &str = "messages";

#[async_trait::async_trait]
pub trait ModuleStore: Send + Sync {
    /// All records of a collection; a missing collection is empty.
    async fn fetch(&self, collection: &str) -> Result<Vec<Value>>;

    /// Upsert by `id`, minting one if absent. Returns the stored record.
    async fn save(&self, collection: &str, record: Value) -> Result<Value>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}

/// Ensure `record` is an object carrying a non-empty string `id`.
fn with_id(mut record: Value) -> Result<(String, Value)> {
    let obj = record
        .as_object_mut()
        .ok_or_else(|| anyhow!("record must be a JSON object"))?;
    let id = match obj.get("id").and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => {
            let fresh = uuid::Uuid::new_v4().to_string();
            obj.insert("id".into(), Value::String(fresh.clone()));
            fresh
        }
    };
    Ok((id, record))
}

fn record_id(v: &Value) -> Option<&str> {
    v.get("id").and_then(Value::as_str)
}

fn upsert(rows: &mut Vec<Value>, id: &str, record: Value) {
    match rows.iter_mut().find(|r| record_id(r) == Some(id)) {
        Some(slot) => *slot = record,
        None => rows.push(record),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ModuleStore for MemoryStore {
    async fn fetch(&self, collection: &str) -> Result<Vec<Value>> {
        let g = self.inner.lock().await;
        Ok(g.get(collection).cloned().unwrap_or_default())
    }

    async fn save(&self, collection: &str, record: Value) -> Result<Value> {
        let (id, record) = with_id(record)?;
        let mut g = self.inner.lock().await;
        upsert(g.entry(collection.to_string()).or_default(), &id, record.clone());
        Ok(record)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut g = self.inner.lock().await;
        if let Some(rows) = g.get_mut(collection) {
            rows.retain(|r| record_id(r) != Some(id));
        }
        Ok(())
    }
}

/// `<dir>/<collection>.json`, each holding a JSON array. Collections are
/// read from disk once and then served from memory; writes go through to
/// the file.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Vec<Value>>>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn load<'a>(
        &self,
        cache: &'a mut HashMap<String, Vec<Value>>,
        collection: &str,
        path: &Path,
    ) -> Result<&'a mut Vec<Value>> {
        if !cache.contains_key(collection) {
            let rows = self.read_rows(path).await?;
            cache.insert(collection.to_string(), rows);
        }
        Ok(cache.entry(collection.to_string()).or_default())
    }

    fn path_for(&self, collection: &str) -> Result<PathBuf> {
        let ok = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !ok {
            return Err(anyhow!("invalid collection name: {collection:?}"));
        }
        Ok(self.dir.join(format!("{collection}.json")))
    }

    async fn read_rows(&self, path: &Path) -> Result<Vec<Value>> {
        match fs::read_to_string(path).await {
            Ok(s) if s.trim().is_empty() => Ok(Vec::new()),
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn write_rows(&self, path: &Path, rows: &[Value]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(rows)?)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("replacing {}", path.display()))
    }
}

#[async_trait::async_trait]
impl ModuleStore for JsonFileStore {
    async fn fetch(&self, collection: &str) -> Result<Vec<Value>> {
        let path = self.path_for(collection)?;
        let mut g = self.cache.lock().await;
        Ok(self.load(&mut g, collection, &path).await?.clone())
    }

    async fn save(&self, collection: &str, record: Value) -> Result<Value> {
        let path = self.path_for(collection)?;
        let (id, record) = with_id(record)?;
        let mut g = self.cache.lock().await;
        let rows = self.load(&mut g, collection, &path).await?;
        upsert(rows, &id, record.clone());
        let res = self.write_rows(&path, rows).await;
        if res.is_err() {
            // memory is ahead of disk; reload on next access
            g.remove(collection);
        }
        res.map(|()| record)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let path = self.path_for(collection)?;
        let mut g = self.cache.lock().await;
        let rows = self.load(&mut g, collection, &path).await?;
        let before = rows.len();
        rows.retain(|r| record_id(r) != Some(id));
        if rows.len() == before {
            return Ok(());
        }
        let res = self.write_rows(&path, rows).await;
        if res.is_err() {
            g.remove(collection);
        }
        res
    }
}
