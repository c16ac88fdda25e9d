use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::ReflexConfig;

/// Loads and reloads the Reflex configuration.
pub struct ConfigLoader {
    config: RwLock<ReflexConfig>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > REFLEX_CONFIG env > ~/.reflex/reflex.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("REFLEX_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".reflex")
            .join("reflex.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> reflex_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::read_file(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            ReflexConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        // Validate config: log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(reflex_core::ReflexError::Config(e));
            }
        }

        Ok(Self {
            config: RwLock::new(config),
            config_path,
        })
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> ReflexConfig {
        self.config.read().clone()
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    fn read_file(path: &Path) -> reflex_core::Result<ReflexConfig> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<ReflexConfig>(&raw).map_err(|e| {
            reflex_core::ReflexError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply env var overrides (REFLEX_DATA_DIR, REFLEX_LOG_LEVEL, etc.)
    fn apply_env_overrides(mut config: ReflexConfig) -> ReflexConfig {
        if let Ok(v) = std::env::var("REFLEX_DATA_DIR") {
            config.store.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("REFLEX_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("REFLEX_MIN_CONFIDENCE") {
            if let Ok(confidence) = v.parse::<f64>() {
                config.promotion.min_confidence = confidence;
            }
        }
        if let Ok(v) = std::env::var("REFLEX_LOCK_STALE_SECS") {
            if let Ok(secs) = v.parse::<u64>() {
                config.lock.stale_after_secs = secs;
            }
        }
        config
    }

    /// Reload the config from disk. The current config is kept if the new one
    /// fails to parse or validate.
    pub fn reload(&self) -> reflex_core::Result<()> {
        if !self.config_path.exists() {
            return Err(reflex_core::ReflexError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let new_config = Self::apply_env_overrides(Self::read_file(&self.config_path)?);
        new_config
            .validate()
            .map_err(reflex_core::ReflexError::Config)?;
        *self.config.write() = new_config;
        info!("configuration reloaded");
        Ok(())
    }
}
