//! Host configuration file support

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Host configuration loaded from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log file path (empty = no file logging in service mode)
    pub log_file: String,

    /// How long `start` waits for the service to report running
    pub start_timeout_secs: u64,

    /// How long `stop` waits for the service to report stopped
    pub stop_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: String::new(),
            start_timeout_secs: 30,
            stop_timeout_secs: 30,
        }
    }
}

impl HostConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().to_string_lossy().to_string(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Load configuration for `service_name` from default locations
    ///
    /// Searches in order:
    /// 1. Same directory as executable: `<service_name>.toml`
    /// 2. `%PROGRAMDATA%\<service_name>\config.toml`
    /// 3. The user configuration directory: `<service_name>/config.toml`
    pub fn load_default(service_name: &str) -> Result<Self, ConfigError> {
        match Self::candidate_paths(service_name)
            .into_iter()
            .find(|p| p.exists())
        {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn candidate_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            paths.push(exe_dir.join(format!("{}.toml", service_name)));
        }

        if let Ok(program_data) = std::env::var("PROGRAMDATA") {
            paths.push(
                Path::new(&program_data)
                    .join(service_name)
                    .join("config.toml"),
            );
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(service_name).join("config.toml"));
        }

        paths
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_string_lossy().to_string(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Io {
            path: path.as_ref().to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Log file path, if configured
    pub fn log_path(&self) -> Option<&Path> {
        if self.log_file.is_empty() {
            None
        } else {
            Some(Path::new(&self.log_file))
        }
    }
}

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading/writing config file
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    /// Error parsing TOML
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    /// Error serializing config
    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: HostConfig = toml::from_str("log_level = \"debug\"").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.stop_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_path(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("servicekit-config-{}", std::process::id()));
        let path = dir.join("config.toml");

        let config = HostConfig {
            log_file: "service.log".into(),
            start_timeout_secs: 5,
            ..HostConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = HostConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.log_path(), Some(Path::new("service.log")));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = std::env::temp_dir().join(format!("servicekit-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "stop_timeout_secs = \"soon\"").unwrap();

        let err = HostConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_error_keeps_source() {
        use std::error::Error as _;

        let path = std::env::temp_dir().join("servicekit-missing-config.toml");
        let err = HostConfig::load(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().starts_with("Failed to access config file"));
        let source = err.source().and_then(|e| e.downcast_ref::<std::io::Error>());
        assert_eq!(source.map(|e| e.kind()), Some(std::io::ErrorKind::NotFound));
    }
}
