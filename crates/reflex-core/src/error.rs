use thiserror::Error;

/// Unified error type for the Reflex pattern tiers.
#[derive(Error, Debug)]
pub enum ReflexError {
    // ── Admission errors ───────────────────────────────────────
    #[error("candidate is missing a pattern key")]
    MissingKey,

    #[error("insufficient evidence for {key}: {have} consecutive successes, need {need}")]
    InsufficientEvidence { key: String, have: u32, need: u32 },

    #[error("confidence too low for {key}: {have:.2} < {need:.2}")]
    LowConfidence { key: String, have: f64, need: f64 },

    // ── Lookup errors ──────────────────────────────────────────
    #[error("pattern not found in System 1: {0}")]
    NotFound(String),

    #[error("pattern not in fast tier: {0}")]
    NotInFastTier(String),

    // ── Storage / lock errors ──────────────────────────────────
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("lock error: {0}")]
    Lock(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReflexError {
    /// Stable tag callers can branch on without matching the enum.
    pub fn kind(&self) -> &'static str {
        match self {
            ReflexError::MissingKey => "missing_key",
            ReflexError::InsufficientEvidence { .. } => "insufficient_evidence",
            ReflexError::LowConfidence { .. } => "low_confidence",
            ReflexError::NotFound(_) => "not_found",
            ReflexError::NotInFastTier(_) => "not_in_fast_tier",
            ReflexError::Storage(_) | ReflexError::Io(_) | ReflexError::Serialization(_) => {
                "storage_failure"
            }
            ReflexError::Lock(_) => "lock",
            ReflexError::Config(_) => "config",
        }
    }

    /// True for admission rejections (the candidate was evaluated and refused).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ReflexError::MissingKey
                | ReflexError::InsufficientEvidence { .. }
                | ReflexError::LowConfidence { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ReflexError>;
