use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use reflex_config::PromotionConfig;
use reflex_core::{
    FastTierRecord, PatternSource, PatternStatus, ReflexError, Result, SlowTierRecord, TierEvent,
    parse_pattern_key,
};

use crate::tiers::PatternTiers;
use crate::transfer_log::TransferLogEntry;

/// Which admission thresholds apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionMode {
    /// Success streak and high confidence required.
    Standard,
    /// Confidence floor only, for seeding a tier with no track record.
    Bootstrap,
}

impl PromotionMode {
    pub fn source(&self) -> PatternSource {
        match self {
            PromotionMode::Standard => PatternSource::System2,
            PromotionMode::Bootstrap => PatternSource::Bootstrap,
        }
    }
}

/// Admission thresholds for the fast tier.
#[derive(Debug, Clone)]
pub struct PromotionPolicy {
    pub min_consecutive_successes: u32,
    pub min_confidence: f64,
    pub bootstrap_min_confidence: f64,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self::from_config(&PromotionConfig::default())
    }
}

impl PromotionPolicy {
    pub fn from_config(config: &PromotionConfig) -> Self {
        Self {
            min_consecutive_successes: config.min_consecutive_successes,
            min_confidence: config.min_confidence,
            bootstrap_min_confidence: config.bootstrap_min_confidence,
        }
    }

    /// Check a candidate against the thresholds for `mode`, returning its key.
    pub fn admit<'a>(&self, candidate: &'a SlowTierRecord, mode: PromotionMode) -> Result<&'a str> {
        let key = candidate.key().ok_or(ReflexError::MissingKey)?;
        match mode {
            PromotionMode::Standard => {
                if candidate.consecutive_successes < self.min_consecutive_successes {
                    return Err(ReflexError::InsufficientEvidence {
                        key: key.to_string(),
                        have: candidate.consecutive_successes,
                        need: self.min_consecutive_successes,
                    });
                }
                if candidate.confidence < self.min_confidence {
                    return Err(ReflexError::LowConfidence {
                        key: key.to_string(),
                        have: candidate.confidence,
                        need: self.min_confidence,
                    });
                }
            }
            PromotionMode::Bootstrap => {
                if candidate.confidence < self.bootstrap_min_confidence {
                    return Err(ReflexError::LowConfidence {
                        key: key.to_string(),
                        have: candidate.confidence,
                        need: self.bootstrap_min_confidence,
                    });
                }
            }
        }
        Ok(key)
    }

    /// Meets the standard thresholds (and has a key).
    pub fn is_eligible(&self, candidate: &SlowTierRecord) -> bool {
        self.admit(candidate, PromotionMode::Standard).is_ok()
    }

    /// Successes still missing before the streak threshold is met.
    pub fn needs_successes(&self, candidate: &SlowTierRecord) -> u32 {
        self.min_consecutive_successes
            .saturating_sub(candidate.consecutive_successes)
    }

    /// Confidence still missing before the standard threshold is met.
    pub fn needs_confidence(&self, candidate: &SlowTierRecord) -> f64 {
        (self.min_confidence - candidate.confidence).max(0.0)
    }
}

/// Build the fast-tier record for an admitted candidate.
///
/// Re-promotion keeps the existing usage and failure counters and bumps
/// `promotion_count`; everything else is taken from the candidate.
pub fn build_fast_record(
    key: &str,
    candidate: &SlowTierRecord,
    existing: Option<&FastTierRecord>,
    source: PatternSource,
    now: DateTime<Utc>,
) -> FastTierRecord {
    let (derived_type, derived_category) = parse_pattern_key(key);
    FastTierRecord {
        key: key.to_string(),
        pattern_type: candidate.pattern_type.clone().unwrap_or(derived_type),
        category: candidate.category.clone().unwrap_or(derived_category),
        confidence: candidate.confidence,
        status: PatternStatus::Active,
        promotion_count: existing.map(|r| r.promotion_count.saturating_add(1)).unwrap_or(1),
        usage_count: existing.map(|r| r.usage_count).unwrap_or(0),
        failure_count: existing.map(|r| r.failure_count).unwrap_or(0),
        consecutive_failures: 0,
        source,
        insight: candidate.insight.clone(),
        best_data: candidate.best_data.clone(),
        last_success_streak: candidate.consecutive_successes,
        last_success_at: existing.and_then(|r| r.last_success_at),
        demoted_at: None,
        promoted_at: Some(now),
    }
}

/// Result of a successful promotion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionOutcome {
    pub key: String,
    pub record: FastTierRecord,
    /// True when the key was already in the fast tier.
    pub repromoted: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_warning: Option<String>,
}

fn promotion_reason(candidate: &SlowTierRecord, mode: PromotionMode) -> String {
    match mode {
        PromotionMode::Standard => format!(
            "Promoted with confidence {:.2} after {} consecutive successes",
            candidate.confidence, candidate.consecutive_successes
        ),
        PromotionMode::Bootstrap => format!(
            "Bootstrap promotion with confidence {:.2}",
            candidate.confidence
        ),
    }
}

impl PatternTiers {
    /// Promote a candidate that meets the standard evidence thresholds.
    pub async fn promote(&self, candidate: &SlowTierRecord) -> Result<PromotionOutcome> {
        self.promote_with(candidate, PromotionMode::Standard).await
    }

    /// Seed the fast tier with a candidate that has no track record yet.
    pub async fn bootstrap_promote(&self, candidate: &SlowTierRecord) -> Result<PromotionOutcome> {
        self.promote_with(candidate, PromotionMode::Bootstrap).await
    }

    async fn promote_with(
        &self,
        candidate: &SlowTierRecord,
        mode: PromotionMode,
    ) -> Result<PromotionOutcome> {
        let key = self.promotion.admit(candidate, mode)?;
        let now = Utc::now();
        let source = mode.source();

        let (record, repromoted) = self
            .cache
            .update(|patterns| {
                let existing = patterns.get(key);
                let record = build_fast_record(key, candidate, existing, source, now);
                let repromoted = existing.is_some();
                patterns.insert(key.to_string(), record.clone());
                Ok((record, repromoted))
            })
            .await?;

        let reason = promotion_reason(candidate, mode);
        info!(
            key,
            %source,
            confidence = record.confidence,
            promotion_count = record.promotion_count,
            "pattern promoted to System 1"
        );
        let log_warning = self
            .log_transfer(TransferLogEntry::promote(key, reason.clone()))
            .await;
        self.events.publish(TierEvent::Promoted {
            key: key.to_string(),
            source,
        });

        Ok(PromotionOutcome {
            key: key.to_string(),
            record,
            repromoted,
            reason,
            log_warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_checks_streak_then_confidence() {
        let policy = PromotionPolicy::default();
        let weak_streak = SlowTierRecord::new("tool::Read", 0.95, 2);
        assert!(matches!(
            policy.admit(&weak_streak, PromotionMode::Standard),
            Err(ReflexError::InsufficientEvidence { have: 2, need: 3, .. })
        ));
        let weak_confidence = SlowTierRecord::new("tool::Read", 0.79, 10);
        assert!(matches!(
            policy.admit(&weak_confidence, PromotionMode::Standard),
            Err(ReflexError::LowConfidence { .. })
        ));
        let exact = SlowTierRecord::new("tool::Read", 0.8, 3);
        assert_eq!(policy.admit(&exact, PromotionMode::Standard).unwrap(), "tool::Read");
    }

    #[test]
    fn bootstrap_ignores_streak() {
        let policy = PromotionPolicy::default();
        let fresh = SlowTierRecord::new("team::Review", 0.3, 0);
        assert!(policy.admit(&fresh, PromotionMode::Bootstrap).is_ok());
        let too_weak = SlowTierRecord::new("team::Review", 0.29, 0);
        assert!(matches!(
            policy.admit(&too_weak, PromotionMode::Bootstrap),
            Err(ReflexError::LowConfidence { .. })
        ));
    }

    #[test]
    fn keyless_candidate_is_rejected_first() {
        let policy = PromotionPolicy::default();
        let keyless = SlowTierRecord {
            confidence: 0.1,
            ..Default::default()
        };
        assert!(matches!(
            policy.admit(&keyless, PromotionMode::Standard),
            Err(ReflexError::MissingKey)
        ));
    }

    #[test]
    fn explicit_type_and_category_win() {
        let mut candidate = SlowTierRecord::new("tool::Read", 0.9, 3);
        candidate.pattern_type = Some("io".into());
        candidate.category = Some("FileRead".into());
        let rec = build_fast_record("tool::Read", &candidate, None, PatternSource::System2, Utc::now());
        assert_eq!(rec.pattern_type, "io");
        assert_eq!(rec.category, "FileRead");
        assert_eq!(rec.promotion_count, 1);
    }

    #[test]
    fn promotion_count_saturates() {
        let candidate = SlowTierRecord::new("tool::Read", 0.9, 3);
        let mut existing = build_fast_record("tool::Read", &candidate, None, PatternSource::System2, Utc::now());
        existing.promotion_count = u32::MAX;
        let rec = build_fast_record("tool::Read", &candidate, Some(&existing), PatternSource::System2, Utc::now());
        assert_eq!(rec.promotion_count, u32::MAX);
    }

    #[test]
    fn needs_are_clamped() {
        let policy = PromotionPolicy::default();
        let strong = SlowTierRecord::new("k::v", 0.95, 9);
        assert_eq!(policy.needs_successes(&strong), 0);
        assert_eq!(policy.needs_confidence(&strong), 0.0);
    }
}
