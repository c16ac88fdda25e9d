use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use reflex_config::DemotionConfig;
use reflex_core::{FastTierRecord, PatternStatus, ReflexError, Result, TierEvent};

use crate::tiers::PatternTiers;
use crate::transfer_log::TransferLogEntry;

/// Reason reported by a manual demotion when the caller gives none.
pub const DEFAULT_DEMOTION_REASON: &str = "Demoted from System 1";

/// Reason logged for a manual demotion when the caller gives none.
pub const DEFAULT_LOGGED_DEMOTION_REASON: &str = "Manual demotion";

/// Live-performance eviction thresholds for the fast tier.
#[derive(Debug, Clone)]
pub struct DemotionPolicy {
    pub max_consecutive_failures: u32,
    pub min_usage_for_rate: u32,
    pub max_failure_rate: f64,
}

impl Default for DemotionPolicy {
    fn default() -> Self {
        Self::from_config(&DemotionConfig::default())
    }
}

impl DemotionPolicy {
    pub fn from_config(config: &DemotionConfig) -> Self {
        Self {
            max_consecutive_failures: config.max_consecutive_failures,
            min_usage_for_rate: config.min_usage_for_rate,
            max_failure_rate: config.max_failure_rate,
        }
    }

    /// Why `record` should be demoted, if it should.
    ///
    /// A failure streak is checked first; the error rate only counts once the
    /// record has enough usage behind it.
    pub fn evaluate(&self, record: &FastTierRecord) -> Option<String> {
        if record.consecutive_failures >= self.max_consecutive_failures {
            return Some(format!(
                "{} consecutive failures",
                record.consecutive_failures
            ));
        }
        if record.usage_count >= self.min_usage_for_rate {
            let rate = record.failure_rate();
            if rate > self.max_failure_rate {
                return Some(format!(
                    "Error rate {:.1}% exceeds {:.1}%",
                    rate * 100.0,
                    self.max_failure_rate * 100.0
                ));
            }
        }
        None
    }
}

fn mark_demoted(record: &mut FastTierRecord) {
    record.status = PatternStatus::Demoted;
    record.demoted_at = Some(Utc::now());
}

/// Result of recording one use of a fast-tier pattern.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutcome {
    pub key: String,
    pub succeeded: bool,
    pub demoted: bool,
    /// Demotion reason, when the use triggered one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub record: FastTierRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_warning: Option<String>,
}

/// Result of a manual demotion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemotionOutcome {
    pub key: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_warning: Option<String>,
}

impl PatternTiers {
    /// Record a hit (`succeeded`) or miss against an active fast-tier pattern,
    /// demoting it if its live signals cross the policy thresholds.
    pub async fn record_usage(&self, key: &str, succeeded: bool) -> Result<UsageOutcome> {
        let policy = &self.demotion;
        let (record, reason) = self
            .cache
            .update(|patterns| {
                let record = patterns
                    .get_mut(key)
                    .filter(|r| r.is_active())
                    .ok_or_else(|| ReflexError::NotInFastTier(key.to_string()))?;

                record.usage_count = record.usage_count.saturating_add(1);
                if succeeded {
                    record.consecutive_failures = 0;
                    record.last_success_at = Some(Utc::now());
                } else {
                    record.failure_count = record.failure_count.saturating_add(1);
                    record.consecutive_failures = record.consecutive_failures.saturating_add(1);
                }

                let reason = policy.evaluate(record);
                if reason.is_some() {
                    mark_demoted(record);
                }
                Ok((record.clone(), reason))
            })
            .await?;

        debug!(
            key,
            succeeded,
            usage_count = record.usage_count,
            failure_count = record.failure_count,
            "usage recorded"
        );
        self.events.publish(TierEvent::UsageRecorded {
            key: key.to_string(),
            succeeded,
        });

        let mut log_warning = None;
        if let Some(ref reason) = reason {
            info!(key, reason = %reason, "pattern auto-demoted from System 1");
            log_warning = self
                .log_transfer(TransferLogEntry::demote(key, reason.clone()))
                .await;
            self.events.publish(TierEvent::Demoted {
                key: key.to_string(),
                reason: reason.clone(),
            });
        }

        Ok(UsageOutcome {
            key: key.to_string(),
            succeeded,
            demoted: reason.is_some(),
            reason,
            record,
            log_warning,
        })
    }

    /// Manually demote an active fast-tier pattern.
    pub async fn demote(&self, key: &str, reason: Option<&str>) -> Result<DemotionOutcome> {
        self.cache
            .update(|patterns| {
                let record = patterns
                    .get_mut(key)
                    .filter(|r| r.is_active())
                    .ok_or_else(|| ReflexError::NotFound(key.to_string()))?;
                mark_demoted(record);
                Ok(())
            })
            .await?;

        let logged_reason = reason.unwrap_or(DEFAULT_LOGGED_DEMOTION_REASON);
        info!(key, reason = logged_reason, "pattern demoted from System 1");
        let log_warning = self
            .log_transfer(TransferLogEntry::demote(key, logged_reason))
            .await;
        self.events.publish(TierEvent::Demoted {
            key: key.to_string(),
            reason: logged_reason.to_string(),
        });

        Ok(DemotionOutcome {
            key: key.to_string(),
            reason: reason.unwrap_or(DEFAULT_DEMOTION_REASON).to_string(),
            log_warning,
        })
    }
}
