// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Snapclass

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Classification API settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Web UI settings
    #[serde(default)]
    pub web: WebConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    /// Endpoint receiving the `image_path` form POST
    #[serde(default = "default_classifier_url")]
    pub url: String,
    /// Request timeout; `None` waits for the remote service indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub mock: MockConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MockConfig {
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
    /// Fixed seed for a reproducible mock sequence
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

// Default value functions
fn default_classifier_url() -> String { "http://example.com/".to_string() }
fn default_failure_rate() -> f64 { 0.33 }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8000 }
fn default_db_path() -> String { "snapclass.db".to_string() }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: default_classifier_url(),
            timeout_secs: None,
            mock: MockConfig::default(),
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            failure_rate: default_failure_rate(),
            seed: None,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::SnapclassError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values serde cannot express as types
    pub fn validate(&self) -> crate::Result<()> {
        if self.classifier.url.trim().is_empty() {
            return Err(crate::SnapclassError::Config(
                "classifier.url must not be empty".to_string(),
            ));
        }
        let rate = self.classifier.mock.failure_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(crate::SnapclassError::Config(format!(
                "classifier.mock.failure_rate must be within [0, 1], got {}",
                rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.classifier.url, "http://example.com/");
        assert_eq!(config.classifier.mock.failure_rate, 0.33);
        assert!(config.classifier.timeout_secs.is_none());
        assert_eq!(config.web.port, 8000);
        assert_eq!(config.database.path, "snapclass.db");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"web": {"port": 9100}, "classifier": {"mock": {"seed": 7}}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.web.port, 9100);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.classifier.mock.seed, Some(7));
        assert_eq!(config.classifier.mock.failure_rate, 0.33);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.classifier.url = "http://classifier.local/api".to_string();
        config.classifier.timeout_secs = Some(30);
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.classifier.url, "http://classifier.local/api");
        assert_eq!(loaded.classifier.timeout_secs, Some(30));
    }

    #[test]
    fn test_rejects_out_of_range_failure_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"classifier": {"mock": {"failure_rate": 1.5}}}"#).unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, crate::SnapclassError::Config(_)));
    }

    #[test]
    fn test_rejects_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(AppConfig::load(&path).is_err());
    }
}
