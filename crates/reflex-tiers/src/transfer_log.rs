use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use reflex_core::Result;

use crate::store::RecordStore;

/// Which kind of tier transfer an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferAction {
    Promote,
    Demote,
    HotSwap,
}

impl std::str::FromStr for TransferAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "promote" => Ok(TransferAction::Promote),
            "demote" => Ok(TransferAction::Demote),
            "hot-swap" | "hotswap" | "hot_swap" => Ok(TransferAction::HotSwap),
            other => Err(format!("unknown transfer action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TransferEvent {
    #[serde(rename_all = "camelCase")]
    Promote { pattern_key: String, reason: String },
    #[serde(rename_all = "camelCase")]
    Demote { pattern_key: String, reason: String },
    HotSwap {
        promoted: Vec<String>,
        demoted: Vec<String>,
    },
}

/// One line of tier history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLogEntry {
    #[serde(flatten)]
    pub event: TransferEvent,
    pub timestamp: DateTime<Utc>,
}

impl TransferLogEntry {
    pub fn now(event: TransferEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }

    pub fn promote(key: &str, reason: impl Into<String>) -> Self {
        Self::now(TransferEvent::Promote {
            pattern_key: key.to_string(),
            reason: reason.into(),
        })
    }

    pub fn demote(key: &str, reason: impl Into<String>) -> Self {
        Self::now(TransferEvent::Demote {
            pattern_key: key.to_string(),
            reason: reason.into(),
        })
    }

    pub fn hot_swap(promoted: Vec<String>, demoted: Vec<String>) -> Self {
        Self::now(TransferEvent::HotSwap { promoted, demoted })
    }

    pub fn action(&self) -> TransferAction {
        match self.event {
            TransferEvent::Promote { .. } => TransferAction::Promote,
            TransferEvent::Demote { .. } => TransferAction::Demote,
            TransferEvent::HotSwap { .. } => TransferAction::HotSwap,
        }
    }
}

/// Bounded, append-only history of tier transfers.
///
/// An absent or unreadable log reads as empty, so a corrupted document is
/// replaced on the next append. Individual malformed entries are skipped.
pub struct TransferLog {
    store: Arc<dyn RecordStore>,
    path: PathBuf,
    max_entries: usize,
    append_gate: Mutex<()>,
}

impl TransferLog {
    pub fn new(store: Arc<dyn RecordStore>, path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            store,
            path: path.into(),
            max_entries: max_entries.max(1),
            append_gate: Mutex::new(()),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Every stored entry, oldest first.
    pub async fn entries(&self) -> Vec<TransferLogEntry> {
        let document = match self.store.read_structured(&self.path).await {
            Ok(Some(document)) => document,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "transfer log unreadable, treating as empty");
                return Vec::new();
            }
        };
        let serde_json::Value::Array(raw) = document else {
            warn!(path = %self.path.display(), "transfer log is not a list, treating as empty");
            return Vec::new();
        };
        raw.into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value::<TransferLogEntry>(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed transfer log entry");
                    None
                }
            })
            .collect()
    }

    /// Append one entry, dropping the oldest past the cap.
    pub async fn append(&self, entry: TransferLogEntry) -> Result<()> {
        let _gate = self.append_gate.lock().await;
        let mut entries = self.entries().await;
        entries.push(entry);
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }
        self.store
            .write_structured(&self.path, &serde_json::to_value(&entries)?)
            .await
    }

    /// The most recent `limit` entries, optionally of one action, oldest first.
    ///
    /// The action filter applies before the limit.
    pub async fn history(
        &self,
        limit: usize,
        action: Option<TransferAction>,
    ) -> Vec<TransferLogEntry> {
        let mut entries = self.entries().await;
        if let Some(action) = action {
            entries.retain(|e| e.action() == action);
        }
        let start = entries.len().saturating_sub(limit);
        entries.split_off(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_wire_shape() {
        let entry = TransferLogEntry::promote("tool::Read", "promoted");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "promote");
        assert_eq!(json["patternKey"], "tool::Read");
        assert!(json.get("timestamp").is_some());

        let swap = TransferLogEntry::hot_swap(vec!["a".into()], vec![]);
        let json = serde_json::to_value(&swap).unwrap();
        assert_eq!(json["action"], "hot-swap");
        assert_eq!(json["promoted"][0], "a");
    }

    #[test]
    fn action_parses() {
        assert_eq!("hot-swap".parse::<TransferAction>().unwrap(), TransferAction::HotSwap);
        assert_eq!("demote".parse::<TransferAction>().unwrap(), TransferAction::Demote);
        assert!("evict".parse::<TransferAction>().is_err());
    }
}
