use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_PORT: u16 = 5678;
const APP_DIR: &str = "markitdown-desktop";
const CONFIG_FILE: &str = "config.json";

pub const PORT_ENV: &str = "MARKITDOWN_PORT";
pub const SERVER_COMMAND_ENV: &str = "MARKITDOWN_SERVER_COMMAND";
pub const LOG_LEVEL_ENV: &str = "MARKITDOWN_LOG_LEVEL";

/// Settings read once at startup. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    /// Replaces the launch plan's program when set.
    pub server_command: Option<String>,
    pub server_args: Option<Vec<String>>,
    pub health_interval_ms: u64,
    pub ready_timeout_ms: u64,
    pub ready_poll_interval_ms: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            server_command: None,
            server_args: None,
            health_interval_ms: 5_000,
            ready_timeout_ms: 15_000,
            ready_poll_interval_ms: 250,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads the user config file (if any) and applies environment overrides.
    pub fn load() -> Result<Self, AppError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("{PORT_ENV} is not a valid port: {port}")))?;
        }
        if let Some(command) = lookup(SERVER_COMMAND_ENV).filter(|c| !c.trim().is_empty()) {
            self.server_command = Some(command);
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.port == 0 {
            return Err(AppError::Config("port must be non-zero".into()));
        }
        if self.health_interval_ms == 0 || self.ready_poll_interval_ms == 0 {
            return Err(AppError::Config("poll intervals must be non-zero".into()));
        }
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| AppError::Config(format!("unknown log level: {}", self.log_level)))?;
        Ok(())
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn log_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.port, 5678);
        assert_eq!(config.base_url(), "http://127.0.0.1:5678");
        assert_eq!(config.health_interval(), Duration::from_secs(5));
        assert_eq!(config.log_level(), LevelFilter::Info);
        assert!(config.server_command.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_config(r#"{ "port": 6000, "log_level": "debug" }"#);
        let config = AppConfig::load_from(file.path()).expect("load config");
        assert_eq!(config.port, 6000);
        assert_eq!(config.log_level(), LevelFilter::Debug);
        assert_eq!(config.ready_timeout_ms, AppConfig::default().ready_timeout_ms);
    }

    #[test]
    fn server_command_from_file() {
        let file = write_config(
            r#"{ "server_command": "/opt/md/server", "server_args": ["--quiet"] }"#,
        );
        let config = AppConfig::load_from(file.path()).expect("load config");
        assert_eq!(config.server_command.as_deref(), Some("/opt/md/server"));
        assert_eq!(config.server_args, Some(vec!["--quiet".to_string()]));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let file = write_config("{ port: ");
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn zero_port_rejected() {
        let file = write_config(r#"{ "port": 0 }"#);
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn env_overrides_beat_file_values() {
        let file = write_config(r#"{ "port": 6000, "log_level": "warn" }"#);
        let mut config = AppConfig::load_from(file.path()).expect("load config");
        let env: HashMap<&str, &str> = HashMap::from([
            (PORT_ENV, "7001"),
            (SERVER_COMMAND_ENV, "markitdown-server"),
            (LOG_LEVEL_ENV, "trace"),
        ]);
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .expect("apply overrides");
        assert_eq!(config.port, 7001);
        assert_eq!(config.server_command.as_deref(), Some("markitdown-server"));
        assert_eq!(config.log_level(), LevelFilter::Trace);
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == PORT_ENV).then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("MARKITDOWN_PORT"));
    }

    #[test]
    fn unknown_log_level_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == LOG_LEVEL_ENV).then(|| "loud".to_string()))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
