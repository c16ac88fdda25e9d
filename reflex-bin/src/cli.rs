use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use reflex_config::{ConfigLoader, ReflexConfig};
use reflex_core::{ReflexError, SlowTierRecord};
use reflex_tiers::{HistoryQuery, OperationReport, PatternTiers, TransferAction};

/// Reflex: promote, demote, and hot-swap learned patterns.
#[derive(Parser)]
#[command(name = "reflex", version, about)]
pub struct Cli {
    /// Path to reflex.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every due promotion and demotion in one sweep
    HotSwap,
    /// Show fast-tier and transfer-log aggregates
    Stats,
    /// Show recent tier transfers
    History {
        /// Number of entries (defaults to transfer_log.default_history_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Only show one action: promote, demote, or hot-swap
        #[arg(short, long)]
        action: Option<TransferAction>,
    },
    /// Classify slow-tier records against the promotion thresholds
    Candidates,
    /// List fast-tier patterns
    List {
        /// Include demoted patterns
        #[arg(short, long)]
        all: bool,
    },
    /// Show one fast-tier pattern
    Get { key: String },
    /// Promote a slow-tier record given as JSON
    Promote { candidate: String },
    /// Seed the fast tier with a record given as JSON, ignoring its streak
    Bootstrap { candidate: String },
    /// Demote a fast-tier pattern
    Demote {
        key: String,
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Record one use of a fast-tier pattern
    Usage {
        key: String,
        /// The pattern did not help
        #[arg(long)]
        failed: bool,
    },
    /// Invalidate the cache and reload the fast tier from storage
    Reload,
}

impl Cli {
    pub async fn run(self) -> reflex_core::Result<OperationReport> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();
        self.init_tracing(&config);
        debug!(config = %config_loader.path().display(), "configuration loaded");

        let tiers = PatternTiers::open(&config).await?;

        let report = match self.command {
            Commands::HotSwap => OperationReport::from_result(tiers.hot_swap().await),
            Commands::Stats => OperationReport::from_result(tiers.stats().await),
            Commands::History { limit, action } => {
                let query = HistoryQuery { limit, action };
                OperationReport::from_result(Ok(tiers.history(query).await))
            }
            Commands::Candidates => OperationReport::from_result(tiers.candidates().await),
            Commands::List { all } => {
                let records = if all {
                    tiers.list_all().await
                } else {
                    tiers.list_active().await
                };
                OperationReport::from_result(records)
            }
            Commands::Get { key } => {
                let record = tiers.get(&key).await.and_then(|r| {
                    r.ok_or_else(|| ReflexError::NotFound(key.clone()))
                });
                OperationReport::from_result(record)
            }
            Commands::Promote { candidate } => match parse_candidate(&candidate) {
                Ok(candidate) => OperationReport::from_result(tiers.promote(&candidate).await),
                Err(e) => OperationReport::failure(&e),
            },
            Commands::Bootstrap { candidate } => match parse_candidate(&candidate) {
                Ok(candidate) => {
                    OperationReport::from_result(tiers.bootstrap_promote(&candidate).await)
                }
                Err(e) => OperationReport::failure(&e),
            },
            Commands::Demote { key, reason } => {
                OperationReport::from_result(tiers.demote(&key, reason.as_deref()).await)
            }
            Commands::Usage { key, failed } => {
                OperationReport::from_result(tiers.record_usage(&key, !failed).await)
            }
            Commands::Reload => {
                tiers.invalidate_cache().await;
                OperationReport::from_result(tiers.list_active().await.map(|r| r.len()))
            }
        };
        Ok(report)
    }

    /// RUST_LOG wins, then --verbose/--quiet/--log-level, then `logging.level`.
    fn init_tracing(&self, config: &ReflexConfig) {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };

        let filter = || {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level))
        };

        // Logs go to stderr so stdout carries only the report.
        match LogFormat::from_config(&config.logging.format) {
            LogFormat::Json => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .json()
                .with_target(true)
                .init(),
            LogFormat::Compact => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .compact()
                .with_target(false)
                .init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .with_target(false)
                .init(),
        }
    }
}

/// Subscriber layout chosen by `logging.format`. Unknown values render pretty;
/// config validation has already warned about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl LogFormat {
    fn from_config(format: &str) -> Self {
        match format {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Parse a candidate argument. `null` is an absent candidate.
fn parse_candidate(raw: &str) -> reflex_core::Result<SlowTierRecord> {
    let candidate: Option<SlowTierRecord> = serde_json::from_str(raw)
        .map_err(|e| ReflexError::Config(format!("invalid candidate JSON: {e}")))?;
    candidate.ok_or(ReflexError::MissingKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_candidate_is_missing_key() {
        assert!(matches!(parse_candidate("null"), Err(ReflexError::MissingKey)));
    }

    #[test]
    fn candidate_json_parses() {
        let candidate =
            parse_candidate(r#"{"key":"tool::Read","confidence":0.9,"consecutiveSuccesses":3}"#)
                .unwrap();
        assert_eq!(candidate.key(), Some("tool::Read"));
        assert_eq!(candidate.consecutive_successes, 3);
    }

    #[test]
    fn every_validated_log_format_has_a_layout() {
        assert_eq!(LogFormat::from_config("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_config("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::from_config("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_config("xml"), LogFormat::Pretty);
    }

    #[test]
    fn history_flags_parse() {
        let cli = Cli::try_parse_from(["reflex", "history", "-n", "5", "--action", "hot-swap"])
            .unwrap();
        match cli.command {
            Commands::History { limit, action } => {
                assert_eq!(limit, Some(5));
                assert_eq!(action, Some(TransferAction::HotSwap));
            }
            _ => panic!("expected history"),
        }
    }
}
