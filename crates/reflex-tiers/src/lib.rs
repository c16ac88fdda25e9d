//! # reflex-tiers
//!
//! Two-tier pattern storage for the Reflex learning loop:
//!
//! - **Slow tier** (System 2): per-category evidence records written by the
//!   rule extractor. Read-only here.
//! - **Fast tier** (System 1): the small set of trusted patterns on the hot
//!   path, cached in memory and persisted as one document.
//!
//! [`PatternTiers`] owns both, plus the transfer log and the policies that
//! promote evidence into the fast tier and demote patterns whose live
//! performance degrades. A hot-swap sweep applies every due transfer at once
//! under an advisory lock.

pub mod cache;
pub mod hot_swap;
pub mod inspect;
pub mod lock;
pub mod promotion;
pub mod report;
pub mod store;
pub mod tiers;
pub mod transfer_log;
pub mod usage;

pub use cache::{FastTierCache, FastTierMap};
pub use hot_swap::HotSwapReport;
pub use inspect::{BelowThreshold, Candidate, CandidateReport, HistoryQuery, TierStats};
pub use lock::{AdvisoryLock, LockGuard, LockState};
pub use promotion::{PromotionMode, PromotionOutcome, PromotionPolicy};
pub use report::OperationReport;
pub use store::{JsonFileStore, MemoryRecordStore, RecordStore, TierLayout};
pub use tiers::PatternTiers;
pub use transfer_log::{TransferAction, TransferEvent, TransferLog, TransferLogEntry};
pub use usage::{DemotionOutcome, DemotionPolicy, UsageOutcome};
