use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use reflex_core::{PatternCategory, Result, SlowTierRecord};

use crate::tiers::PatternTiers;
use crate::transfer_log::{TransferAction, TransferLogEntry};

/// An eligible slow-tier record not yet in the fast tier.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub key: String,
    pub category: PatternCategory,
    pub confidence: f64,
    pub consecutive_successes: u32,
    pub sample_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight: Option<String>,
}

/// A slow-tier record still short of the standard thresholds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BelowThreshold {
    pub key: String,
    pub category: PatternCategory,
    pub confidence: f64,
    pub consecutive_successes: u32,
    pub sample_size: u32,
    pub needs_successes: u32,
    pub needs_confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReport {
    /// Highest confidence first.
    pub candidates: Vec<Candidate>,
    pub below_threshold: Vec<BelowThreshold>,
    pub already_promoted: Vec<String>,
}

/// Aggregates over the fast tier and the transfer log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    pub system1_count: usize,
    pub total_promotions: usize,
    pub total_demotions: usize,
    pub avg_confidence: f64,
    pub avg_usage_count: f64,
    pub hot_swap_count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    /// Defaults to `transfer_log.default_history_limit`.
    pub limit: Option<usize>,
    pub action: Option<TransferAction>,
}

impl HistoryQuery {
    pub fn last(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            action: None,
        }
    }

    pub fn action(mut self, action: TransferAction) -> Self {
        self.action = Some(action);
        self
    }
}

impl PatternTiers {
    /// Classify every slow-tier record against the fast tier and the
    /// standard promotion thresholds.
    pub async fn candidates(&self) -> Result<CandidateReport> {
        let slow = self.slow_tier_all().await;
        let fast = self.cache.load().await?;

        let mut report = CandidateReport::default();
        let mut seen_promoted = HashSet::new();
        for (category, record) in slow {
            let Some(key) = record.key().map(str::to_string) else {
                continue;
            };
            if fast.contains_key(&key) {
                if seen_promoted.insert(key.clone()) {
                    report.already_promoted.push(key);
                }
                continue;
            }
            if self.promotion.is_eligible(&record) {
                report.candidates.push(candidate(key, category, record));
            } else {
                report.below_threshold.push(BelowThreshold {
                    needs_successes: self.promotion.needs_successes(&record),
                    needs_confidence: self.promotion.needs_confidence(&record),
                    key,
                    category,
                    confidence: record.confidence,
                    consecutive_successes: record.consecutive_successes,
                    sample_size: record.sample_size,
                });
            }
        }
        report
            .candidates
            .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(report)
    }

    pub async fn stats(&self) -> Result<TierStats> {
        let active = self.cache.list_active().await?;
        let entries = self.log.entries().await;
        let count_of = |action: TransferAction| entries.iter().filter(|e| e.action() == action).count();

        let (avg_confidence, avg_usage_count) = if active.is_empty() {
            (0.0, 0.0)
        } else {
            let n = active.len() as f64;
            (
                active.iter().map(|r| r.confidence).sum::<f64>() / n,
                active.iter().map(|r| r.usage_count as f64).sum::<f64>() / n,
            )
        };

        Ok(TierStats {
            system1_count: active.len(),
            total_promotions: count_of(TransferAction::Promote),
            total_demotions: count_of(TransferAction::Demote),
            avg_confidence,
            avg_usage_count,
            hot_swap_count: count_of(TransferAction::HotSwap),
        })
    }

    /// The most recent transfer-log entries, oldest first.
    pub async fn history(&self, query: HistoryQuery) -> Vec<TransferLogEntry> {
        let limit = query.limit.unwrap_or(self.default_history_limit);
        self.log.history(limit, query.action).await
    }
}

fn candidate(key: String, category: PatternCategory, record: SlowTierRecord) -> Candidate {
    Candidate {
        key,
        category,
        confidence: record.confidence,
        consecutive_successes: record.consecutive_successes,
        sample_size: record.sample_size,
        insight: record.insight,
    }
}
