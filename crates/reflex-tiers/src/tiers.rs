use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use reflex_config::ReflexConfig;
use reflex_core::{EventBus, FastTierRecord, PatternCategory, Result, SlowTierRecord, TierEvent};

use crate::cache::FastTierCache;
use crate::lock::{AdvisoryLock, LockState};
use crate::promotion::PromotionPolicy;
use crate::store::{JsonFileStore, RecordStore, TierLayout, parse_slow_tier};
use crate::transfer_log::{TransferLog, TransferLogEntry};
use crate::usage::DemotionPolicy;

/// The two-tier pattern store: slow-tier evidence, the fast-tier cache, the
/// transfer log, and the policies that move patterns between them.
///
/// Operations are spread over the `promotion`, `usage`, `hot_swap`, and
/// `inspect` modules as further `impl PatternTiers` blocks.
pub struct PatternTiers {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) layout: TierLayout,
    pub(crate) cache: FastTierCache,
    pub(crate) log: TransferLog,
    pub(crate) promotion: PromotionPolicy,
    pub(crate) demotion: DemotionPolicy,
    pub(crate) lock: AdvisoryLock,
    pub(crate) events: EventBus,
    pub(crate) default_history_limit: usize,
}

impl PatternTiers {
    /// Open the JSON-file tiers rooted at `store.data_dir`.
    pub async fn open(config: &ReflexConfig) -> Result<Self> {
        info!(data_dir = %config.store.data_dir.display(), "opening pattern tiers");
        let store: Arc<dyn RecordStore> = Arc::new(JsonFileStore::new());
        let tiers = Self::with_store(store, config);
        tiers.store.ensure_container(tiers.layout.root()).await?;
        tiers
            .store
            .ensure_container(&tiers.layout.slow_tier_dir())
            .await?;
        Ok(tiers)
    }

    /// Build the tiers over any record store. Nothing is read until first use.
    pub fn with_store(store: Arc<dyn RecordStore>, config: &ReflexConfig) -> Self {
        let layout = TierLayout::new(&config.store.data_dir);
        let lock = AdvisoryLock::new(
            layout.hot_swap_lock(),
            Duration::from_secs(config.lock.stale_after_secs),
        )
        .with_contention(
            config.lock.contention_retries,
            Duration::from_millis(config.lock.retry_delay_ms),
        );

        Self {
            cache: FastTierCache::new(Arc::clone(&store), layout.fast_tier()),
            log: TransferLog::new(
                Arc::clone(&store),
                layout.transfer_log(),
                config.transfer_log.max_entries,
            ),
            promotion: PromotionPolicy::from_config(&config.promotion),
            demotion: DemotionPolicy::from_config(&config.demotion),
            events: EventBus::new(config.events.capacity),
            default_history_limit: config.transfer_log.default_history_limit,
            store,
            layout,
            lock,
        }
    }

    pub fn layout(&self) -> &TierLayout {
        &self.layout
    }

    pub fn promotion_policy(&self) -> &PromotionPolicy {
        &self.promotion
    }

    pub fn demotion_policy(&self) -> &DemotionPolicy {
        &self.demotion
    }

    /// Receive tier events as they are committed.
    pub fn subscribe(&self) -> broadcast::Receiver<TierEvent> {
        self.events.subscribe()
    }

    // ── Fast tier queries ──────────────────────────────────────

    pub async fn get(&self, key: &str) -> Result<Option<FastTierRecord>> {
        self.cache.get(key).await
    }

    pub async fn list_active(&self) -> Result<Vec<FastTierRecord>> {
        self.cache.list_active().await
    }

    /// Every fast-tier record, demoted ones included.
    pub async fn list_all(&self) -> Result<Vec<FastTierRecord>> {
        Ok(self.cache.load().await?.into_values().collect())
    }

    pub async fn invalidate_cache(&self) {
        self.cache.invalidate().await;
    }

    pub async fn lock_state(&self) -> LockState {
        self.lock.inspect().await
    }

    // ── Slow tier ──────────────────────────────────────────────

    /// Keyed records of one slow-tier category. An unreadable document is
    /// logged and read as empty.
    pub async fn slow_tier(&self, category: PatternCategory) -> Vec<SlowTierRecord> {
        let path = self.layout.slow_tier(category);
        let document = match self.store.read_structured(&path).await {
            Ok(Some(document)) => document,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(%category, error = %e, "slow tier unreadable, skipping");
                return Vec::new();
            }
        };
        parse_slow_tier(document).unwrap_or_else(|e| {
            warn!(%category, error = %e, "slow tier malformed, skipping");
            Vec::new()
        })
    }

    /// All slow-tier records, tagged with the category document they came from.
    pub async fn slow_tier_all(&self) -> Vec<(PatternCategory, SlowTierRecord)> {
        let mut all = Vec::new();
        for category in PatternCategory::ALL {
            all.extend(
                self.slow_tier(category)
                    .await
                    .into_iter()
                    .map(|r| (category, r)),
            );
        }
        all
    }

    // ── Transfer log ───────────────────────────────────────────

    /// Append to the transfer log. A failed append is not an operation
    /// failure; the returned warning is surfaced on the outcome instead.
    pub(crate) async fn log_transfer(&self, entry: TransferLogEntry) -> Option<String> {
        match self.log.append(entry).await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "failed to append transfer log entry");
                Some(format!("transfer log not updated: {e}"))
            }
        }
    }
}
