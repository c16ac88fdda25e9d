use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use reflex_core::{FastTierRecord, ReflexError, Result};

use crate::store::{FastTierDocument, RecordStore};

/// Fast-tier records keyed by pattern key.
pub type FastTierMap = BTreeMap<String, FastTierRecord>;

/// Lazily-populated mirror of the persisted fast tier.
///
/// The first `load()` reads the document; later calls reuse the in-memory map
/// until `invalidate()`. Mutations go through [`FastTierCache::update`], which
/// holds the cache lock across the persist so writers within one process are
/// serialized.
pub struct FastTierCache {
    store: Arc<dyn RecordStore>,
    path: PathBuf,
    state: Mutex<Option<FastTierMap>>,
}

impl FastTierCache {
    pub fn new(store: Arc<dyn RecordStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
            state: Mutex::new(None),
        }
    }

    /// Snapshot of the full mapping, active and demoted.
    pub async fn load(&self) -> Result<FastTierMap> {
        let mut state = self.state.lock().await;
        Ok(self.populate(&mut state).await?.clone())
    }

    pub async fn get(&self, key: &str) -> Result<Option<FastTierRecord>> {
        let mut state = self.state.lock().await;
        Ok(self.populate(&mut state).await?.get(key).cloned())
    }

    pub async fn list_active(&self) -> Result<Vec<FastTierRecord>> {
        let mut state = self.state.lock().await;
        Ok(self
            .populate(&mut state)
            .await?
            .values()
            .filter(|r| r.is_active())
            .cloned()
            .collect())
    }

    /// Drop the in-memory copy; the next access re-reads storage.
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
        debug!(path = %self.path.display(), "fast tier cache invalidated");
    }

    /// Read-modify-write the fast tier.
    ///
    /// `f` works on a copy. The copy is persisted only if it differs from the
    /// current map, and becomes the cached state only after the write succeeds.
    /// If `f` fails, nothing is written.
    pub async fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut FastTierMap) -> Result<T>,
    {
        let mut state = self.state.lock().await;
        let current = self.populate(&mut state).await?;
        let mut next = current.clone();
        let value = f(&mut next)?;
        if next != *current {
            self.persist(&next).await?;
            *state = Some(next);
        }
        Ok(value)
    }

    async fn populate<'a>(&self, state: &'a mut Option<FastTierMap>) -> Result<&'a FastTierMap> {
        if state.is_none() {
            let map = self.read().await?;
            debug!(count = map.len(), path = %self.path.display(), "fast tier loaded");
            *state = Some(map);
        }
        state
            .as_ref()
            .ok_or_else(|| ReflexError::Storage("fast tier cache unavailable".into()))
    }

    async fn read(&self) -> Result<FastTierMap> {
        let Some(document) = self.store.read_structured(&self.path).await? else {
            return Ok(FastTierMap::new());
        };
        let document: FastTierDocument = serde_json::from_value(document).map_err(|e| {
            ReflexError::Storage(format!(
                "invalid fast tier document {}: {}",
                self.path.display(),
                e
            ))
        })?;
        // Later duplicates win, keeping one record per key.
        Ok(document
            .patterns
            .into_iter()
            .map(|mut r| {
                r.fill_derived();
                (r.key.clone(), r)
            })
            .collect())
    }

    async fn persist(&self, map: &FastTierMap) -> Result<()> {
        let document = FastTierDocument {
            patterns: map.values().cloned().collect(),
            updated_at: Utc::now(),
        };
        self.store
            .write_structured(&self.path, &serde_json::to_value(&document)?)
            .await
    }
}
