//! Configuration loading and management
//!
//! Configuration comes from a YAML file (path in `COURSE_API_CONFIG`) or the
//! built-in defaults, then a handful of environment variables override it:
//! `HOST`, `PORT`, `JWT_SECRET`, `UPLOAD_DIR`, `BLOB_DIR`, `PAGE_SIZE`.

use crate::core::query::DEFAULT_PAGE_SIZE;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Environment variable naming the YAML config file
pub const CONFIG_PATH_ENV: &str = "COURSE_API_CONFIG";

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

/// Token signing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for issued tokens; empty until configured
    pub jwt_secret: String,

    /// Lifetime of issued tokens
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Upload staging and blob storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where uploads are staged before reaching the blob store
    pub upload_dir: PathBuf,

    /// Filesystem blob store root; blobs stay in memory when unset
    pub blob_dir: Option<PathBuf>,

    /// Largest accepted request body, uploads included
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: std::env::temp_dir().join("course-api-uploads"),
            blob_dir: None,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "course_api=info,tower_http=info".to_string(),
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// File (if any), then environment overrides, then validation
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_yaml_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("BLOB_DIR") {
            self.storage.blob_dir = Some(PathBuf::from(dir));
        }
        if let Some(size) = lookup("PAGE_SIZE") {
            self.pagination.page_size = size
                .parse()
                .with_context(|| format!("PAGE_SIZE must be a positive integer, got '{}'", size))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("auth.jwt_secret must be set (JWT_SECRET or the config file)");
        }
        if self.pagination.page_size == 0 {
            bail!("pagination.page_size must be at least 1");
        }
        if self.auth.token_ttl_hours <= 0 {
            bail!("auth.token_ttl_hours must be positive");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.server.host, self.server.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.pagination.page_size, 10);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert!(config.storage.blob_dir.is_none());
        assert!(config.auth.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_secret_must_be_configured() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config
            .apply_overrides(|key| (key == "JWT_SECRET").then(|| "s3cr3t".to_string()))
            .unwrap();
        assert!(config.validate().is_ok());

        let from_yaml = AppConfig::from_yaml_str("auth:\n  jwt_secret: from-file\n").unwrap();
        assert!(from_yaml.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            r#"
server:
  port: 8080
pagination:
  page_size: 25
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.pagination.page_size, 25);
        assert_eq!(config.log.filter, "course_api=info,tower_http=info");
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("PORT", "4000"),
            ("JWT_SECRET", "s3cr3t"),
            ("BLOB_DIR", "/var/lib/course-api/blobs"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.auth.jwt_secret, "s3cr3t");
        assert_eq!(
            config.storage.blob_dir,
            Some(PathBuf::from("/var/lib/course-api/blobs"))
        );
        assert_eq!(config.socket_addr().unwrap().port(), 4000);
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let mut config = AppConfig::default();
        assert!(config.apply_overrides(|key| (key == "PORT").then(|| "http".to_string())).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.jwt_secret = "s3cr3t".to_string();
        config.pagination.page_size = 0;
        assert!(config.validate().is_err());

        config.pagination.page_size = 10;
        config.auth.token_ttl_hours = 0;
        assert!(config.validate().is_err());
    }
}
