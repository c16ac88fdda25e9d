use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use reflex_core::{PatternSource, PatternStatus, Result, TierEvent};

use crate::promotion::build_fast_record;
use crate::tiers::PatternTiers;
use crate::transfer_log::TransferLogEntry;

/// What one hot-swap sweep changed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotSwapReport {
    pub promoted: Vec<String>,
    pub demoted: Vec<String>,
    /// Active records the sweep left alone.
    pub unchanged: usize,
    pub timestamp: DateTime<Utc>,
    /// A stale lock from an earlier sweep was taken over.
    pub recovered_stale_lock: bool,
    /// Another sweep still held the lock; this one ran without it.
    pub contended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_warning: Option<String>,
}

impl HotSwapReport {
    pub fn changed(&self) -> bool {
        !self.promoted.is_empty() || !self.demoted.is_empty()
    }
}

struct SweepChanges {
    promoted: Vec<String>,
    demoted: Vec<(String, String)>,
    unchanged: usize,
}

impl PatternTiers {
    /// Apply every due promotion and demotion in one pass under the hot-swap
    /// lock. The lock is released whether or not the sweep succeeds.
    pub async fn hot_swap(&self) -> Result<HotSwapReport> {
        let guard = self.lock.acquire().await?;
        let recovered_stale_lock = guard.recovered_stale();
        let contended = guard.contended();

        let result = self.sweep().await;

        if let Err(e) = guard.release().await {
            warn!(error = %e, "failed to release hot-swap lock");
        }

        let mut report = result?;
        report.recovered_stale_lock = recovered_stale_lock;
        report.contended = contended;
        Ok(report)
    }

    async fn sweep(&self) -> Result<HotSwapReport> {
        // Slow-tier reads happen before the cache lock is taken.
        let slow = self.slow_tier_all().await;
        let now = Utc::now();
        let promotion = &self.promotion;
        let demotion = &self.demotion;

        let changes = self
            .cache
            .update(|patterns| {
                let mut demoted = Vec::new();
                for (key, record) in patterns.iter_mut() {
                    if !record.is_active() {
                        continue;
                    }
                    if let Some(reason) = demotion.evaluate(record) {
                        record.status = PatternStatus::Demoted;
                        record.demoted_at = Some(now);
                        demoted.push((key.clone(), reason));
                    }
                }
                let unchanged = patterns.values().filter(|r| r.is_active()).count();

                let mut promoted = Vec::new();
                for (_, candidate) in &slow {
                    let Some(key) = candidate.key() else { continue };
                    if patterns.contains_key(key) || !promotion.is_eligible(candidate) {
                        continue;
                    }
                    let record =
                        build_fast_record(key, candidate, None, PatternSource::System2, now);
                    patterns.insert(key.to_string(), record);
                    promoted.push(key.to_string());
                }

                Ok(SweepChanges {
                    promoted,
                    demoted,
                    unchanged,
                })
            })
            .await?;

        let demoted: Vec<String> = changes.demoted.iter().map(|(k, _)| k.clone()).collect();
        let mut report = HotSwapReport {
            promoted: changes.promoted,
            demoted,
            unchanged: changes.unchanged,
            timestamp: now,
            recovered_stale_lock: false,
            contended: false,
            log_warning: None,
        };

        if report.changed() {
            info!(
                promoted = ?report.promoted,
                demoted = ?report.demoted,
                unchanged = report.unchanged,
                "hot-swap applied"
            );
            report.log_warning = self
                .log_transfer(TransferLogEntry::hot_swap(
                    report.promoted.clone(),
                    report.demoted.clone(),
                ))
                .await;
        } else {
            info!(unchanged = report.unchanged, "hot-swap found nothing to change");
        }

        for key in &report.promoted {
            self.events.publish(TierEvent::Promoted {
                key: key.clone(),
                source: PatternSource::System2,
            });
        }
        for (key, reason) in changes.demoted {
            self.events.publish(TierEvent::Demoted { key, reason });
        }
        self.events.publish(TierEvent::HotSwapCompleted {
            promoted: report.promoted.clone(),
            demoted: report.demoted.clone(),
            unchanged: report.unchanged,
        });

        Ok(report)
    }
}
