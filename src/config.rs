//! Configuration management for CentralChain

use crate::blockchain::DEFAULT_DIFFICULTY;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
/// A SHA-256 hex digest has 64 characters; no hash can satisfy more.
pub const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chain: ChainConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Apply a `PORT`-style override. Unparseable values are ignored.
    pub fn with_port_override(mut self, port: Option<&str>) -> Self {
        if let Some(raw) = port {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid PORT value {:?}", raw),
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "chain.difficulty must be at most {}, got {}",
                MAX_DIFFICULTY, self.chain.difficulty
            )));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".to_string()));
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must be set".to_string()));
        }

        Ok(())
    }
}

/// Load `config.toml` from the working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(Path::new(DEFAULT_CONFIG_PATH))
}

/// Load configuration from `path`, falling back to defaults when the file is
/// absent, then apply the `PORT` environment variable and validate.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config = if path.exists() {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!("Loaded configuration from {}", path.display());
        Config::from_toml_str(&raw, &path.display().to_string())?
    } else {
        info!("No configuration at {}; using defaults", path.display());
        Config::default()
    };

    let port = std::env::var("PORT").ok();
    let config = config.with_port_override(port.as_deref());
    config.validate()?;
    Ok(config)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_difficulty() -> usize {
    DEFAULT_DIFFICULTY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.chain.difficulty, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str("[chain]\ndifficulty = 2\n", "inline").unwrap();
        assert_eq!(config.chain.difficulty, 2);
        assert_eq!(config.server.port, 3000);

        let empty = Config::from_toml_str("", "inline").unwrap();
        assert_eq!(empty, Config::default());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = Config::from_toml_str("[chain\n", "broken.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == "broken.toml"));
    }

    #[test]
    fn test_port_override() {
        let config = Config::default().with_port_override(Some("8081"));
        assert_eq!(config.server.port, 8081);

        let config = Config::default().with_port_override(Some("not-a-port"));
        assert_eq!(config.server.port, 3000);

        let config = Config::default().with_port_override(None);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.chain.difficulty = MAX_DIFFICULTY + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chain.difficulty = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[server]\nhost = \"127.0.0.1\"\n\n[chain]\ndifficulty = 1").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.chain.difficulty, 1);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.chain.difficulty, DEFAULT_DIFFICULTY);
    }

    #[test]
    fn test_load_config_reads_working_directory() {
        // cargo runs tests from the package root, next to the sample config.toml
        let config = load_config().unwrap();
        assert_eq!(config.chain.difficulty, DEFAULT_DIFFICULTY);
        assert!(!config.server.host.is_empty());
    }
}
