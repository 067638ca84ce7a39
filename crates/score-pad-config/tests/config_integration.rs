use score_pad_config::{AppConfig, HistorySettings};

#[test]
fn test_load_creates_default_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score-pad.json");
    assert!(!path.exists());

    let config = AppConfig::load_or_create(&path);
    assert!(path.exists());
    assert_eq!(config.history, HistorySettings::default());

    // File should contain valid JSON
    let contents = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert!(parsed.is_object());
    assert!(parsed["history"].is_object());
}

#[test]
fn test_load_existing_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score-pad.json");
    let json = r#"{
        "history": {
            "max_units": 2000,
            "min_transactions": 5,
            "persisted_transactions": 20
        },
        "data_dir": "/srv/score-pad",
        "log_filter": "debug"
    }"#;
    std::fs::write(&path, json).unwrap();

    let config = AppConfig::load_or_create(&path);
    assert_eq!(config.history.max_units, 2000);
    assert_eq!(config.history.min_transactions, 5);
    assert_eq!(config.history.persisted_transactions, 20);
    assert_eq!(config.data_dir, "/srv/score-pad");
    assert_eq!(config.log_filter, "debug");
}

#[test]
fn test_broken_json_returns_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score-pad.json");
    std::fs::write(&path, "{ this is not valid json }}}").unwrap();

    let config = AppConfig::load_or_create(&path);
    assert_eq!(config.history, HistorySettings::default());

    // Broken file is left alone
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "{ this is not valid json }}}");
}

#[test]
fn test_save_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score-pad.json");

    let config = AppConfig {
        history: HistorySettings {
            max_units: 64,
            min_transactions: 2,
            persisted_transactions: 3,
        },
        log_filter: "trace".to_string(),
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = AppConfig::load_or_create(&path);
    assert_eq!(loaded.history, config.history);
    assert_eq!(loaded.log_filter, "trace");
}

#[test]
fn test_sanitize_applied_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score-pad.json");
    std::fs::write(
        &path,
        r#"{"history": {"max_units": 0, "min_transactions": 0}, "log_filter": ""}"#,
    )
    .unwrap();

    let config = AppConfig::load_or_create(&path);
    assert_eq!(config.history.max_units, 1);
    assert_eq!(config.history.min_transactions, 1);
    assert_eq!(config.log_filter, "info");
}
