use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, mapped from `reflex.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflexConfig {
    pub store: StoreConfig,
    pub promotion: PromotionConfig,
    pub demotion: DemotionConfig,
    pub lock: LockConfig,
    pub transfer_log: TransferLogConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

// ── Store ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory holding the slow-tier, fast-tier, and log documents.
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".reflex")
                .join("patterns"),
        }
    }
}

// ── Promotion ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    /// Success streak required for a standard promotion.
    pub min_consecutive_successes: u32,
    /// Confidence required for a standard promotion (0.0-1.0).
    pub min_confidence: f64,
    /// Confidence required to seed a pattern with no track record.
    pub bootstrap_min_confidence: f64,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            min_consecutive_successes: 3,
            min_confidence: 0.8,
            bootstrap_min_confidence: 0.3,
        }
    }
}

// ── Demotion ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemotionConfig {
    /// Demote once this many failures happen back to back.
    pub max_consecutive_failures: u32,
    /// Error-rate demotion only applies after this many uses.
    pub min_usage_for_rate: u32,
    /// Demote when failures / uses strictly exceeds this ratio.
    pub max_failure_rate: f64,
}

impl Default for DemotionConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 2,
            min_usage_for_rate: 5,
            max_failure_rate: 0.2,
        }
    }
}

// ── Lock ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// A lock whose timestamp is older than this is treated as abandoned.
    pub stale_after_secs: u64,
    /// Extra attempts made against a fresh lock before proceeding anyway.
    pub contention_retries: u32,
    /// Delay between contention retries.
    pub retry_delay_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 30,
            contention_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

// ── Transfer log ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferLogConfig {
    /// Oldest entries are dropped once the log grows past this.
    pub max_entries: usize,
    /// `history()` limit when the caller gives none.
    pub default_history_limit: usize,
}

impl Default for TransferLogConfig {
    fn default() -> Self {
        Self {
            max_entries: 200,
            default_history_limit: 50,
        }
    }
}

// ── Events ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast buffer size for tier events.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A config validation warning with severity, field path, and suggestion.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "{} {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, " ({})", h)?;
        }
        Ok(())
    }
}

fn unit_interval(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl ReflexConfig {
    /// Validate the config.
    ///
    /// Returns every finding on success; returns `Err` with the joined error
    /// messages when any finding has `Error` severity.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Promotion thresholds ───
        for (field, value) in [
            ("promotion.min_confidence", self.promotion.min_confidence),
            (
                "promotion.bootstrap_min_confidence",
                self.promotion.bootstrap_min_confidence,
            ),
        ] {
            if !unit_interval(value) {
                warnings.push(ConfigWarning {
                    field: field.into(),
                    message: format!("confidence {} is out of range", value),
                    severity: WarningSeverity::Error,
                    hint: Some("Confidence must be between 0.0 and 1.0".into()),
                });
            }
        }
        if self.promotion.bootstrap_min_confidence > self.promotion.min_confidence {
            warnings.push(ConfigWarning {
                field: "promotion.bootstrap_min_confidence".into(),
                message: "bootstrap threshold is stricter than the standard threshold".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Bootstrap admission is meant to be the looser of the two".into()),
            });
        }
        if self.promotion.min_consecutive_successes == 0 {
            warnings.push(ConfigWarning {
                field: "promotion.min_consecutive_successes".into(),
                message: "0 disables the success-streak requirement".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Demotion thresholds ───
        if self.demotion.max_consecutive_failures == 0 {
            warnings.push(ConfigWarning {
                field: "demotion.max_consecutive_failures".into(),
                message: "0 would demote every pattern on first use".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 2".into()),
            });
        }
        if !unit_interval(self.demotion.max_failure_rate) {
            warnings.push(ConfigWarning {
                field: "demotion.max_failure_rate".into(),
                message: format!("rate {} is out of range", self.demotion.max_failure_rate),
                severity: WarningSeverity::Error,
                hint: Some("Failure rate must be between 0.0 and 1.0".into()),
            });
        }

        // ── Lock ───
        if self.lock.stale_after_secs == 0 {
            warnings.push(ConfigWarning {
                field: "lock.stale_after_secs".into(),
                message: "every lock will be treated as stale".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set to e.g. 30".into()),
            });
        }

        // ── Transfer log ───
        if self.transfer_log.max_entries == 0 {
            warnings.push(ConfigWarning {
                field: "transfer_log.max_entries".into(),
                message: "log cap of 0 discards all history".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 200".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
