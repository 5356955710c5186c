//! Configuration for webstore

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("webstore")
}

/// How uploads reach the blob file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Truncate the blob file and write into it. A concurrent reader may see
    /// an empty or partial file.
    #[default]
    Direct,
    /// Write to a file in the staging directory, then rename it over the blob.
    Staged,
}

/// Named payload sizes used by the test tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    /// 1 MiB
    Small,
    /// 10 MiB
    Medium,
    /// 100 MiB
    Large,
}

impl SizeClass {
    pub const fn bytes(self) -> usize {
        match self {
            SizeClass::Small => 1024 * 1024,
            SizeClass::Medium => 10 * 1024 * 1024,
            SizeClass::Large => 100 * 1024 * 1024,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SizeClass::Small => "small",
            SizeClass::Medium => "medium",
            SizeClass::Large => "large",
        }
    }
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage directory (blobs and staging live underneath)
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Host to bind the HTTP API to
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Key material for encryption at rest.
    /// Hashed into the 256-bit cipher key; changing it makes existing blobs unreadable.
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Upload write strategy
    #[serde(default)]
    pub write_mode: WriteMode,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_secret() -> String {
    "This is a secret".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            bind_host: default_bind_host(),
            http_port: default_http_port(),
            secret: default_secret(),
            write_mode: WriteMode::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get blobs directory
    pub fn blobs_dir(&self) -> PathBuf {
        self.storage_dir.join("blobs")
    }

    /// Get staging directory used by [`WriteMode::Staged`]
    pub fn staging_dir(&self) -> PathBuf {
        self.storage_dir.join("staging")
    }

    /// Copy of this config with the secret reset to its default, for writing to disk
    pub fn without_secret(&self) -> Self {
        Self {
            secret: default_secret(),
            ..self.clone()
        }
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }

    /// Socket address for the HTTP API
    pub fn bind_addr(&self) -> Result<SocketAddr, StoreError> {
        format!("{}:{}", self.bind_host, self.http_port)
            .parse()
            .map_err(|e| StoreError::Config(format!("invalid bind address: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_size_classes() {
        assert_eq!(SizeClass::Small.bytes(), 1 << 20);
        assert_eq!(SizeClass::Medium.bytes(), 10 << 20);
        assert_eq!(SizeClass::Large.bytes(), 100 << 20);
        assert_eq!(SizeClass::Medium.label(), "medium");
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            storage_dir: temp_dir.path().to_path_buf(),
            http_port: 9191,
            secret: "another secret".into(),
            write_mode: WriteMode::Staged,
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.http_port, 9191);
        assert_eq!(loaded.secret, "another secret");
        assert_eq!(loaded.write_mode, WriteMode::Staged);
        assert_eq!(loaded.blobs_dir(), temp_dir.path().join("blobs"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("http_port = 1234").unwrap();
        assert_eq!(config.http_port, 1234);
        assert_eq!(config.write_mode, WriteMode::Direct);
        assert_eq!(config.secret, default_secret());
        assert_eq!(config.bind_addr().unwrap().port(), 1234);
    }

    #[test]
    fn test_saved_config_omits_secret() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            storage_dir: temp_dir.path().to_path_buf(),
            secret: "from the environment".into(),
            http_port: 9292,
            ..Config::default()
        };
        config.without_secret().save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("from the environment"));

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.secret, default_secret());
        assert_eq!(loaded.http_port, 9292);
        assert_eq!(config.secret, "from the environment");
    }
}
