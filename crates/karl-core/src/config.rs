use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

#[derive(Debug, Deserialize)]
struct RawConfig {
    db: RawDbConfig,
    #[serde(default)]
    bind_addr: Option<String>,
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    env: Option<String>,
    #[serde(default)]
    supermarkets_path: Option<String>,
    imagecitations: RawImageCitationsConfig,
    #[serde(default)]
    session: Option<RawSessionConfig>,
}

#[derive(Debug, Deserialize)]
struct RawDbConfig {
    host: String,
    user: String,
    password: String,
    database: String,
    #[serde(default)]
    max_connections: Option<u32>,
    #[serde(default)]
    min_connections: Option<u32>,
    #[serde(default)]
    acquire_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawImageCitationsConfig {
    path: String,
}

#[derive(Debug, Deserialize)]
struct RawSessionConfig {
    #[serde(default)]
    ticket_ttl_secs: Option<u64>,
    #[serde(default)]
    session_ttl_secs: Option<u64>,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SUPERMARKETS_PATH: &str = "./config/supermarkets.yaml";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SESSION_TICKET_TTL_SECS: u64 = 5 * 60;
const DEFAULT_SESSION_SESSION_TTL_SECS: u64 = 6 * 60 * 60;

/// Load application configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, fails
/// validation, or if `imagecitations.path` does not exist as a writable
/// directory.
pub fn load_app_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let raw: RawConfig = serde_yaml::from_str(&content).map_err(ConfigError::ConfigFileParse)?;

    build_app_config(raw)
}

fn build_app_config(raw: RawConfig) -> Result<AppConfig, ConfigError> {
    let bind_addr_raw = raw.bind_addr.unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let bind_addr = bind_addr_raw
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidKey {
            key: "bind_addr".to_string(),
            reason: e.to_string(),
        })?;

    let env = parse_environment(raw.env.as_deref().unwrap_or("development"));

    let supermarkets_path = PathBuf::from(
        raw.supermarkets_path
            .unwrap_or_else(|| DEFAULT_SUPERMARKETS_PATH.to_string()),
    );

    let imagecitations_path = PathBuf::from(raw.imagecitations.path);
    validate_imagecitations_path(&imagecitations_path)?;

    let session = raw.session.unwrap_or(RawSessionConfig {
        ticket_ttl_secs: None,
        session_ttl_secs: None,
    });

    Ok(AppConfig {
        db_host: raw.db.host,
        db_user: raw.db.user,
        db_password: raw.db.password,
        db_database: raw.db.database,
        env,
        bind_addr,
        log_level: raw.log_level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        supermarkets_path,
        imagecitations_path,
        db_max_connections: raw.db.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        db_min_connections: raw.db.min_connections.unwrap_or(DEFAULT_DB_MIN_CONNECTIONS),
        db_acquire_timeout_secs: raw
            .db
            .acquire_timeout_secs
            .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS),
        session_ticket_ttl_secs: session
            .ticket_ttl_secs
            .unwrap_or(DEFAULT_SESSION_TICKET_TTL_SECS),
        session_session_ttl_secs: session
            .session_ttl_secs
            .unwrap_or(DEFAULT_SESSION_SESSION_TTL_SECS),
    })
}

/// Fail fast if the image-citations directory is missing, matching the
/// original's `image_citations` constructor check.
fn validate_imagecitations_path(path: &Path) -> Result<(), ConfigError> {
    let metadata = std::fs::metadata(path).map_err(|_| ConfigError::PathUnwritable {
        path: path.display().to_string(),
    })?;
    if !metadata.is_dir() {
        return Err(ConfigError::PathUnwritable {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
