/// Application configuration: load, save, and sanitize.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Undo history tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Retention ceiling in action size units (minimum 1).
    pub max_units: usize,
    /// Transactions kept undoable even above the ceiling (minimum 1).
    pub min_transactions: usize,
    /// Most recent past transactions written to disk (minimum 1).
    pub persisted_transactions: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_units: 30_000,
            min_transactions: 30,
            persisted_transactions: 10,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub history: HistorySettings,
    /// Directory holding the history database. Empty = default location.
    pub data_dir: String,
    /// Log filter used when `RUST_LOG` is not set (e.g. "info", "debug").
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history: HistorySettings::default(),
            data_dir: String::new(),
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Returns the config file path.
    ///
    /// Resolution order:
    /// 1. `score-pad.json` next to the executable
    /// 2. `score-pad.json` in the user's config directory
    /// 3. `score-pad.json` in the working directory
    pub fn config_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join("score-pad.json")))
            .or_else(|| dirs::config_dir().map(|d| d.join("score-pad").join("score-pad.json")))
            .unwrap_or_else(|| PathBuf::from("score-pad.json"))
    }

    /// Loads config from `path`, creating a default file if it doesn't exist.
    /// Returns defaults on any error (missing file, parse error, etc.).
    pub fn load_or_create(path: &std::path::Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                    Ok(mut config) => {
                        config.sanitize();
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {}: {e}", path.display());
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {}: {e}", path.display());
                }
            }
            // Return defaults on error (don't overwrite broken file)
            Self::default()
        } else {
            let config = Self::default();
            if let Err(e) = config.save(path) {
                tracing::warn!("Failed to create default config at {}: {e}", path.display());
            }
            config
        }
    }

    /// Saves config to `path` as pretty-printed JSON.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Clamps values to valid ranges and resets invalid fields.
    pub fn sanitize(&mut self) {
        self.history.max_units = self.history.max_units.max(1);
        self.history.min_transactions = self.history.min_transactions.max(1);
        self.history.persisted_transactions = self.history.persisted_transactions.max(1);
        self.data_dir = self.data_dir.trim().to_string();
        if self.log_filter.trim().is_empty() {
            self.log_filter = "info".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.history.max_units, 30_000);
        assert_eq!(config.history.min_transactions, 30);
        assert_eq!(config.history.persisted_transactions, 10);
        assert!(config.data_dir.is_empty());
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_sanitize_clamps_history_minimums() {
        let mut config = AppConfig::default();
        config.history.max_units = 0;
        config.history.min_transactions = 0;
        config.history.persisted_transactions = 0;
        config.sanitize();
        assert_eq!(config.history.max_units, 1);
        assert_eq!(config.history.min_transactions, 1);
        assert_eq!(config.history.persisted_transactions, 1);
    }

    #[test]
    fn test_sanitize_preserves_valid_values() {
        let mut config = AppConfig::default();
        config.history.max_units = 123;
        config.history.min_transactions = 4;
        config.sanitize();
        assert_eq!(config.history.max_units, 123);
        assert_eq!(config.history.min_transactions, 4);
    }

    #[test]
    fn test_sanitize_resets_blank_log_filter() {
        let mut config = AppConfig::default();
        config.log_filter = "   ".to_string();
        config.sanitize();
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_sanitize_trims_data_dir() {
        let mut config = AppConfig::default();
        config.data_dir = "  /var/lib/score-pad ".to_string();
        config.sanitize();
        assert_eq!(config.data_dir, "/var/lib/score-pad");
    }

    #[test]
    fn test_serde_round_trip() {
        let mut config = AppConfig::default();
        config.history.max_units = 77;
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.history, config.history);
        assert_eq!(parsed.log_filter, config.log_filter);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        // Simulates a config file written before the history section existed
        let json = r#"{"log_filter": "debug"}"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.log_filter, "debug");
        assert_eq!(parsed.history, HistorySettings::default());
    }

    #[test]
    fn test_partial_history_section_gets_defaults() {
        let json = r#"{"history": {"max_units": 9}}"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.history.max_units, 9);
        assert_eq!(parsed.history.min_transactions, 30);
    }
}
