use serde::{Deserialize, Serialize};

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::PatternSource;

/// Tier transitions, published as they are committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierEvent {
    Promoted {
        key: String,
        source: PatternSource,
    },
    Demoted {
        key: String,
        reason: String,
    },
    UsageRecorded {
        key: String,
        succeeded: bool,
    },
    HotSwapCompleted {
        promoted: Vec<String>,
        demoted: Vec<String>,
        unchanged: usize,
    },
}

/// A broadcast-based bus for tier events.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<TierEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: TierEvent) {
        // Ignore send errors (no subscribers).
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TierEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
