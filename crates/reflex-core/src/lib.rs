//! # reflex-core
//!
//! Shared vocabulary for the Reflex pattern tiers: the slow/fast record model,
//! pattern-key parsing, tier events, and the error taxonomy every other crate
//! in the workspace returns.

pub mod error;
pub mod event;
pub mod types;

pub use error::{ReflexError, Result};
pub use event::{EventBus, TierEvent};
pub use types::*;
