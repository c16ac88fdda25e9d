#[cfg(test)]
mod tests {
    use reflex_config::ConfigLoader;
    use reflex_config::schema::*;
    use std::io::Write;

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_promotion_config_defaults() {
        let config = PromotionConfig::default();
        assert_eq!(config.min_consecutive_successes, 3);
        assert_eq!(config.min_confidence, 0.8);
        assert_eq!(config.bootstrap_min_confidence, 0.3);
    }

    #[test]
    fn test_demotion_config_defaults() {
        let config = DemotionConfig::default();
        assert_eq!(config.max_consecutive_failures, 2);
        assert_eq!(config.min_usage_for_rate, 5);
        assert_eq!(config.max_failure_rate, 0.2);
    }

    #[test]
    fn test_lock_and_log_defaults() {
        let config = ReflexConfig::default();
        assert_eq!(config.lock.stale_after_secs, 30);
        assert_eq!(config.transfer_log.max_entries, 200);
        assert_eq!(config.transfer_log.default_history_limit, 50);
        assert!(config.store.data_dir.ends_with(".reflex/patterns"));
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "pretty");
    }

    #[test]
    fn test_defaults_validate_cleanly() {
        let warnings = ReflexConfig::default().validate().unwrap();
        assert!(warnings.is_empty());
    }

    // ── TOML tests ─────────────────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = ReflexConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: ReflexConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.promotion.min_confidence, config.promotion.min_confidence);
        assert_eq!(restored.lock.stale_after_secs, config.lock.stale_after_secs);
        assert_eq!(restored.store.data_dir, config.store.data_dir);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[promotion]
min_confidence = 0.9

[lock]
stale_after_secs = 10
"#;
        let config: ReflexConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.promotion.min_confidence, 0.9);
        assert_eq!(config.lock.stale_after_secs, 10);
        // Defaults should fill in
        assert_eq!(config.promotion.min_consecutive_successes, 3);
        assert_eq!(config.demotion.max_failure_rate, 0.2);
        assert_eq!(config.transfer_log.max_entries, 200);
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_out_of_range_confidence_is_error() {
        let mut config = ReflexConfig::default();
        config.promotion.min_confidence = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.contains("promotion.min_confidence"));
    }

    #[test]
    fn test_zero_log_cap_is_error() {
        let mut config = ReflexConfig::default();
        config.transfer_log.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_failure_streak_is_error() {
        let mut config = ReflexConfig::default();
        config.demotion.max_consecutive_failures = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_bootstrap_threshold_warns() {
        let mut config = ReflexConfig::default();
        config.promotion.bootstrap_min_confidence = 0.9;
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, WarningSeverity::Warning);
        assert_eq!(warnings[0].field, "promotion.bootstrap_min_confidence");
    }

    #[test]
    fn test_unknown_log_format_warns() {
        let mut config = ReflexConfig::default();
        config.logging.format = "xml".into();
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "logging.format"));
    }

    #[test]
    fn test_supported_log_formats_pass() {
        for format in ["pretty", "json", "compact"] {
            let mut config = ReflexConfig::default();
            config.logging.format = format.into();
            let warnings = config.validate().unwrap();
            assert!(!warnings.iter().any(|w| w.field == "logging.format"), "{format}");
        }
    }

    // ── ConfigLoader tests ─────────────────────────────────────

    #[test]
    fn test_config_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("reflex.toml");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            r#"
[store]
data_dir = "/var/lib/reflex"

[demotion]
max_consecutive_failures = 4
max_failure_rate = 0.35

[transfer_log]
max_entries = 500
"#
        )
        .unwrap();

        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        let config = loader.get();
        assert_eq!(config.demotion.max_consecutive_failures, 4);
        assert_eq!(config.demotion.max_failure_rate, 0.35);
        assert_eq!(config.transfer_log.max_entries, 500);
        assert_eq!(loader.path(), config_path.as_path());
    }

    #[test]
    fn test_config_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(loader.get().promotion.min_consecutive_successes, 3);
    }

    #[test]
    fn test_config_loader_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("reflex.toml");
        std::fs::write(&config_path, "[demotion]\nmax_failure_rate = 2.0\n").unwrap();
        assert!(ConfigLoader::load(Some(config_path.as_path())).is_err());
    }

    #[test]
    fn test_config_loader_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("reflex.toml");
        std::fs::write(&config_path, "[promotion\nmin_confidence = ").unwrap();
        let err = ConfigLoader::load(Some(config_path.as_path())).err().unwrap();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_config_loader_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("reflex.toml");

        std::fs::write(&config_path, "[promotion]\nmin_consecutive_successes = 5\n").unwrap();

        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        assert_eq!(loader.get().promotion.min_consecutive_successes, 5);

        std::fs::write(&config_path, "[promotion]\nmin_consecutive_successes = 7\n").unwrap();
        loader.reload().unwrap();
        assert_eq!(loader.get().promotion.min_consecutive_successes, 7);

        // An invalid edit keeps the previous config.
        std::fs::write(&config_path, "[transfer_log]\nmax_entries = 0\n").unwrap();
        assert!(loader.reload().is_err());
        assert_eq!(loader.get().promotion.min_consecutive_successes, 7);
    }
}
