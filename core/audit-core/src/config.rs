//! Runtime configuration.
//!
//! Loaded from `~/.rdp-audit/config.toml` unless a path is given. Every field
//! has a default, so a missing file or an empty table is a valid config.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detector::{Debounce, DEFAULT_MISS_THRESHOLD};
use crate::error::ConfigError;
use crate::types::DEFAULT_RDP_PORT;

const AUDIT_DIR_NAME: &str = ".rdp-audit";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "sessions.db";
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_LOG_FILE_NAME: &str = "rdp-audit.log";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MonitorSettings {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_miss_threshold")]
    pub miss_threshold: u8,
    #[serde(default = "default_rdp_port")]
    pub rdp_port: u16,
}

impl MonitorSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn debounce(&self) -> Debounce {
        Debounce::new(self.miss_threshold)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            miss_threshold: default_miss_threshold(),
            rdp_port: default_rdp_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_command")]
    pub command: String,
    #[serde(default = "default_provider_args")]
    pub args: Vec<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            command: default_provider_command(),
            args: default_provider_args(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct StoreSettings {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingSettings {
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_dir: None,
            file_name: default_log_file_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct AuditConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AuditConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "monitor.tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.monitor.miss_threshold == 0 {
            return Err(ConfigError::Invalid(
                "monitor.miss_threshold must be at least 1".to_string(),
            ));
        }
        if self.monitor.rdp_port == 0 {
            return Err(ConfigError::Invalid(
                "monitor.rdp_port must be greater than zero".to_string(),
            ));
        }
        if self.provider.command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "provider.command must not be empty".to_string(),
            ));
        }
        if self.logging.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "logging.file_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        self.monitor.tick_interval()
    }

    /// The configured database path, or `~/.rdp-audit/sessions.db`.
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(audit_dir()?.join(DB_FILE_NAME)),
        }
    }
}

pub fn audit_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(AUDIT_DIR_NAME))
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(audit_dir()?.join(CONFIG_FILE_NAME))
}

/// Loads and validates the config. A missing file yields defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<AuditConfig, ConfigError> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(AuditConfig::default());
    }

    let config = parse_config(&config_path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(path: &Path) -> Result<AuditConfig, ConfigError> {
    let content = fs_err::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<AuditConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_miss_threshold() -> u8 {
    DEFAULT_MISS_THRESHOLD
}

fn default_rdp_port() -> u16 {
    DEFAULT_RDP_PORT
}

fn default_provider_command() -> String {
    "netstat".to_string()
}

fn default_provider_args() -> Vec<String> {
    let args: &[&str] = if cfg!(any(target_os = "windows", target_os = "macos")) {
        &["-n", "-p", "tcp"]
    } else {
        &["-tn"]
    };
    args.iter().map(|arg| arg.to_string()).collect()
}

fn default_log_file_name() -> String {
    DEFAULT_LOG_FILE_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config =
            load_config(Some(temp_dir.path().join("missing.toml"))).expect("load config");
        assert_eq!(config, AuditConfig::default());
        assert_eq!(config.monitor.tick_interval_ms, 1_000);
        assert_eq!(config.monitor.miss_threshold, 6);
        assert_eq!(config.monitor.rdp_port, 3389);
        assert_eq!(config.provider.command, "netstat");
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn parses_all_sections() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(
            &path,
            r#"
[monitor]
tick_interval_ms = 500
miss_threshold = 10
rdp_port = 13389

[provider]
command = "ss"
args = ["-tn"]

[store]
db_path = "/var/lib/rdp-audit/sessions.db"

[logging]
log_dir = "/var/log/rdp-audit"
file_name = "monitor.log"
"#,
        )
        .expect("write config");

        let config = load_config(Some(path)).expect("load config");
        assert_eq!(config.monitor.tick_interval(), Duration::from_millis(500));
        assert_eq!(config.monitor.debounce().miss_threshold(), 10);
        assert_eq!(config.monitor.rdp_port, 13389);
        assert_eq!(config.provider.command, "ss");
        assert_eq!(config.provider.args, vec!["-tn".to_string()]);
        assert_eq!(
            config.db_path().expect("db path"),
            PathBuf::from("/var/lib/rdp-audit/sessions.db")
        );
        assert_eq!(
            config.logging.log_dir,
            Some(PathBuf::from("/var/log/rdp-audit"))
        );
        assert_eq!(config.logging.file_name, "monitor.log");
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "[monitor]\nmiss_threshold = 3\n").expect("write config");

        let config = load_config(Some(path)).expect("load config");
        assert_eq!(config.monitor.miss_threshold, 3);
        assert_eq!(config.monitor.tick_interval_ms, 1_000);
        assert_eq!(config.provider, ProviderSettings::default());
    }

    #[test]
    fn rejects_zero_threshold() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "[monitor]\nmiss_threshold = 0\n").expect("write config");

        let err = load_config(Some(path)).expect_err("zero threshold");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_interval_and_empty_command() {
        let mut config = AuditConfig::default();
        config.monitor.tick_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AuditConfig::default();
        config.provider.command = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn reports_malformed_toml() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "[monitor\ntick_interval_ms = ").expect("write config");

        let err = load_config(Some(path)).expect_err("malformed");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn threshold_out_of_range_is_a_parse_error() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "[monitor]\nmiss_threshold = 300\n").expect("write config");

        let err = load_config(Some(path)).expect_err("out of range");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
