use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use reflex_core::{FastTierRecord, PatternCategory, ReflexError, Result, SlowTierRecord};

/// Structured-document persistence used by every tier.
///
/// Reads return `None` for an absent document. Writes replace the whole
/// document; a concurrent reader sees either the old or the new content.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read_structured(&self, path: &Path) -> Result<Option<Value>>;

    async fn write_structured(&self, path: &Path, document: &Value) -> Result<()>;

    async fn ensure_container(&self, path: &Path) -> Result<()>;
}

/// Where each logical document lives under the data directory.
#[derive(Debug, Clone)]
pub struct TierLayout {
    root: PathBuf,
}

impl TierLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slow_tier_dir(&self) -> PathBuf {
        self.root.join("slow")
    }

    pub fn slow_tier(&self, category: PatternCategory) -> PathBuf {
        self.slow_tier_dir().join(format!("{}.json", category.as_str()))
    }

    pub fn fast_tier(&self) -> PathBuf {
        self.root.join("system1.json")
    }

    pub fn transfer_log(&self) -> PathBuf {
        self.root.join("transfer-log.json")
    }

    pub fn hot_swap_lock(&self) -> PathBuf {
        self.root.join("locks").join("hot-swap.lock")
    }
}

/// Persisted shape of the fast tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastTierDocument {
    #[serde(default)]
    pub patterns: Vec<FastTierRecord>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// A slow-tier document is either a bare list or `{ "patterns": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SlowTierDocument {
    List(Vec<SlowTierRecord>),
    Wrapped {
        #[serde(default)]
        patterns: Vec<SlowTierRecord>,
    },
}

/// Parse a slow-tier document, dropping records without a key.
pub fn parse_slow_tier(document: Value) -> Result<Vec<SlowTierRecord>> {
    let records = match serde_json::from_value::<SlowTierDocument>(document)? {
        SlowTierDocument::List(records) => records,
        SlowTierDocument::Wrapped { patterns } => patterns,
    };
    Ok(records.into_iter().filter(|r| r.key().is_some()).collect())
}

// ── JSON files on disk ─────────────────────────────────────────

/// [`RecordStore`] backed by pretty-printed JSON files.
#[derive(Debug, Clone, Default)]
pub struct JsonFileStore;

impl JsonFileStore {
    pub fn new() -> Self {
        Self
    }

    fn temp_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn read_structured(&self, path: &Path) -> Result<Option<Value>> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ReflexError::Storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        debug!(path = %path.display(), bytes = raw.len(), "read document");
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            ReflexError::Storage(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    async fn write_structured(&self, path: &Path, document: &Value) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.ensure_container(parent).await?;
        }
        let json = serde_json::to_string_pretty(document)?;
        let tmp = Self::temp_path(path);
        let write = async {
            tokio::fs::write(&tmp, json.as_bytes()).await?;
            tokio::fs::rename(&tmp, path).await
        };
        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ReflexError::Storage(format!(
                "failed to write {}: {}",
                path.display(),
                e
            )));
        }
        debug!(path = %path.display(), bytes = json.len(), "wrote document");
        Ok(())
    }

    async fn ensure_container(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await.map_err(|e| {
            ReflexError::Storage(format!("failed to create {}: {}", path.display(), e))
        })
    }
}

// ── In-memory ──────────────────────────────────────────────────

/// In-process [`RecordStore`] (for tests and embedding).
///
/// Counts reads per path and can be told to fail writes to chosen paths.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    documents: Mutex<HashMap<PathBuf, Value>>,
    reads: Mutex<HashMap<PathBuf, usize>>,
    failing_writes: Mutex<HashSet<PathBuf>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing failure injection.
    pub fn insert(&self, path: impl Into<PathBuf>, document: Value) {
        self.documents.lock().insert(path.into(), document);
    }

    /// Current content of a document.
    pub fn document(&self, path: &Path) -> Option<Value> {
        self.documents.lock().get(path).cloned()
    }

    /// Number of `read_structured` calls made for `path`.
    pub fn reads(&self, path: &Path) -> usize {
        self.reads.lock().get(path).copied().unwrap_or(0)
    }

    /// Make every subsequent write to `path` fail.
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        self.failing_writes.lock().insert(path.into());
    }

    /// Clear all injected write failures.
    pub fn heal(&self) {
        self.failing_writes.lock().clear();
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn read_structured(&self, path: &Path) -> Result<Option<Value>> {
        *self.reads.lock().entry(path.to_path_buf()).or_insert(0) += 1;
        Ok(self.documents.lock().get(path).cloned())
    }

    async fn write_structured(&self, path: &Path, document: &Value) -> Result<()> {
        if self.failing_writes.lock().contains(path) {
            return Err(ReflexError::Storage(format!(
                "injected write failure: {}",
                path.display()
            )));
        }
        self.documents
            .lock()
            .insert(path.to_path_buf(), document.clone());
        Ok(())
    }

    async fn ensure_container(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_and_wrapped_slow_documents() {
        let bare = json!([{ "key": "tool::Read", "confidence": 0.9 }, { "confidence": 0.5 }]);
        let wrapped = json!({ "patterns": [{ "key": "error::Timeout" }] });
        assert_eq!(parse_slow_tier(bare).unwrap().len(), 1);
        let records = parse_slow_tier(wrapped).unwrap();
        assert_eq!(records[0].key(), Some("error::Timeout"));
    }

    #[test]
    fn rejects_non_list_slow_document() {
        assert!(parse_slow_tier(json!("not a list")).is_err());
    }

    #[test]
    fn layout_paths() {
        let layout = TierLayout::new("/data");
        assert_eq!(layout.slow_tier(PatternCategory::Team), PathBuf::from("/data/slow/team.json"));
        assert_eq!(layout.fast_tier(), PathBuf::from("/data/system1.json"));
        assert!(layout.hot_swap_lock().ends_with("locks/hot-swap.lock"));
    }
}
