use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pattern type used when a key carries no `::` separator.
pub const FALLBACK_PATTERN_TYPE: &str = "general";

/// Separator between the type and category halves of a pattern key.
pub const KEY_SEPARATOR: &str = "::";

/// Split a `"<type>::<category>"` key on its first separator.
///
/// Keys without a separator fall back to `("general", "")`.
pub fn parse_pattern_key(key: &str) -> (String, String) {
    match key.split_once(KEY_SEPARATOR) {
        Some((ty, category)) => (ty.to_string(), category.to_string()),
        None => (FALLBACK_PATTERN_TYPE.to_string(), String::new()),
    }
}

/// The slow-tier stores, one document per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternCategory {
    Tool,
    Error,
    Success,
    Team,
    General,
}

impl PatternCategory {
    pub const ALL: [PatternCategory; 5] = [
        PatternCategory::Tool,
        PatternCategory::Error,
        PatternCategory::Success,
        PatternCategory::Team,
        PatternCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Tool => "tool",
            PatternCategory::Error => "error",
            PatternCategory::Success => "success",
            PatternCategory::Team => "team",
            PatternCategory::General => "general",
        }
    }
}

impl std::fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PatternCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatternCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown pattern category '{s}'"))
    }
}

/// An evidence-accumulating record owned by the slow tier.
///
/// Written by the external rule extractor; this crate only reads it. Missing
/// numeric fields deserialize to zero so thresholds can be checked uniformly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowTierRecord {
    #[serde(default)]
    pub key: Option<String>,
    /// Explicit type; derived from `key` when absent.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub pattern_type: Option<String>,
    /// Explicit category; derived from `key` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub consecutive_successes: u32,
    #[serde(default)]
    pub insight: Option<String>,
    #[serde(default)]
    pub best_data: Option<serde_json::Value>,
    #[serde(default)]
    pub sample_size: u32,
}

impl SlowTierRecord {
    pub fn new(key: impl Into<String>, confidence: f64, consecutive_successes: u32) -> Self {
        Self {
            key: Some(key.into()),
            confidence,
            consecutive_successes,
            ..Default::default()
        }
    }

    /// The key, treating an empty string as missing.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatus {
    #[default]
    Active,
    Demoted,
}

/// How a fast-tier record was admitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSource {
    /// Graduated on accumulated slow-tier evidence.
    #[default]
    System2,
    /// Seeded without a track record.
    Bootstrap,
}

impl std::fmt::Display for PatternSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternSource::System2 => f.write_str("system2"),
            PatternSource::Bootstrap => f.write_str("bootstrap"),
        }
    }
}

/// A pattern on the hot path. At most one record exists per key; demotion
/// flips `status` rather than deleting.
///
/// Only `key` is required on read. An empty `type` or `category` is derived
/// from the key by [`FastTierRecord::fill_derived`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastTierRecord {
    pub key: String,
    #[serde(default, rename = "type")]
    pub pattern_type: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub status: PatternStatus,
    #[serde(default = "default_promotion_count")]
    pub promotion_count: u32,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub failure_count: u32,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub source: PatternSource,
    #[serde(default)]
    pub insight: Option<String>,
    #[serde(default)]
    pub best_data: Option<serde_json::Value>,
    #[serde(default)]
    pub last_success_streak: u32,
    #[serde(default)]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demoted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_at: Option<DateTime<Utc>>,
}

fn default_promotion_count() -> u32 {
    1
}

impl FastTierRecord {
    /// Fill an empty `type` or `category` from the key.
    pub fn fill_derived(&mut self) {
        if self.pattern_type.is_empty() || self.category.is_empty() {
            let (derived_type, derived_category) = parse_pattern_key(&self.key);
            if self.pattern_type.is_empty() {
                self.pattern_type = derived_type;
            }
            if self.category.is_empty() {
                self.category = derived_category;
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PatternStatus::Active
    }

    /// Observed failure ratio, 0.0 before any usage.
    pub fn failure_rate(&self) -> f64 {
        if self.usage_count == 0 {
            0.0
        } else {
            self.failure_count as f64 / self.usage_count as f64
        }
    }
}
