//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read connection file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No database connection found (expected DATABASE_URL or DATABASE_URL_<NAME> in {0})")]
    NoConnections(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(127, 0, 0, 1),
            port: 3000,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Snapshot engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// Schema that gets introspected, dumped and dropped
    pub schema: String,
    /// Tables whose names start with one of these prefixes are bookkeeping tables
    pub excluded_table_prefixes: Vec<String>,
    /// Root directory for generated artifacts
    pub backups_dir: PathBuf,
    /// Maximum number of rows rendered into one INSERT statement
    pub insert_batch_size: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            excluded_table_prefixes: vec!["kysely".to_string()],
            backups_dir: PathBuf::from("backups"),
            insert_batch_size: 1000,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub snapshot: SnapshotConfig,
    /// File holding the DATABASE_URL aliases
    pub env_file: PathBuf,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            host: std::env::var("HOST")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().port),
        };

        let cors = CorsConfig {
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|s| split_list(&s))
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let defaults = SnapshotConfig::default();
        let insert_batch_size = match std::env::var("INSERT_BATCH_SIZE") {
            Ok(raw) => match raw.parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::InvalidValue(format!(
                        "INSERT_BATCH_SIZE must be a positive integer, got '{}'",
                        raw
                    )))
                }
                Ok(size) => size,
            },
            Err(_) => defaults.insert_batch_size,
        };

        let snapshot = SnapshotConfig {
            schema: std::env::var("SNAPSHOT_SCHEMA").unwrap_or(defaults.schema),
            excluded_table_prefixes: std::env::var("SNAPSHOT_EXCLUDE_PREFIXES")
                .ok()
                .map(|s| split_list(&s))
                .unwrap_or(defaults.excluded_table_prefixes),
            backups_dir: std::env::var("BACKUPS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.backups_dir),
            insert_batch_size,
        };

        let env_file = std::env::var("ENV_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".env"));

        Ok(Self {
            server,
            cors,
            snapshot,
            env_file,
        })
    }
}

/// Split a comma separated list, dropping blank entries
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_default_snapshot_config() {
        let config = SnapshotConfig::default();
        assert_eq!(config.schema, "public");
        assert_eq!(config.excluded_table_prefixes, vec!["kysely".to_string()]);
        assert_eq!(config.backups_dir, PathBuf::from("backups"));
        assert_eq!(config.insert_batch_size, 1000);
    }

    #[test]
    fn test_split_list_drops_blank_entries() {
        assert_eq!(
            split_list("kysely, _sqlx ,,"),
            vec!["kysely".to_string(), "_sqlx".to_string()]
        );
    }
}
