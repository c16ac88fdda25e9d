//! # reflex-config
//!
//! Configuration system for Reflex. Reads from `reflex.toml` and environment
//! variables, in that precedence order, then validates the thresholds.

pub mod schema;
pub mod loader;

pub use schema::ReflexConfig;
pub use schema::{
    ConfigWarning, DemotionConfig, EventsConfig, LockConfig, LoggingConfig, PromotionConfig,
    StoreConfig, TransferLogConfig, WarningSeverity,
};
pub use loader::ConfigLoader;
