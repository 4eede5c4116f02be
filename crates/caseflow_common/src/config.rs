//! Daemon configuration
//!
//! Configuration lives in /etc/caseflow/config.toml; the CASEFLOW_CONFIG
//! environment variable overrides the path. Missing file means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// System configuration directory
pub const SYSTEM_CONFIG_DIR: &str = "/etc/caseflow";
const CONFIG_FILE: &str = "config.toml";

/// Caseflow data directory
pub const DATA_DIR: &str = "/var/lib/caseflow";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseflowConfig {
    /// Address the HTTP surface binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// How many times a closed case may be reopened
    #[serde(default = "default_max_reopen_count")]
    pub max_reopen_count: u32,

    /// Cap on recipients resolved for one transition
    #[serde(default = "default_notification_fanout_cap")]
    pub notification_fanout_cap: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8790".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DATA_DIR).join("caseflow.db")
}

fn default_max_reopen_count() -> u32 {
    2
}

fn default_notification_fanout_cap() -> usize {
    50
}

impl Default for CaseflowConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            max_reopen_count: default_max_reopen_count(),
            notification_fanout_cap: default_notification_fanout_cap(),
        }
    }
}

impl CaseflowConfig {
    /// Resolve the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CASEFLOW_CONFIG") {
            return PathBuf::from(path);
        }
        PathBuf::from(SYSTEM_CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load from disk, falling back to defaults when the file is absent
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CaseflowConfig::default();
        assert_eq!(config.max_reopen_count, 2);
        assert_eq!(config.bind_addr, "127.0.0.1:8790");
        assert!(config.db_path.ends_with("caseflow.db"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: CaseflowConfig = toml::from_str("max_reopen_count = 5").unwrap();
        assert_eq!(config.max_reopen_count, 5);
        assert_eq!(config.bind_addr, "127.0.0.1:8790");
        assert_eq!(config.notification_fanout_cap, 50);
    }

    #[test]
    fn test_full_toml() {
        let config: CaseflowConfig = toml::from_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            db_path = "/tmp/test.db"
            max_reopen_count = 1
            notification_fanout_cap = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.max_reopen_count, 1);
    }
}
