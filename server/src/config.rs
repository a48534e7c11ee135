use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_ROOT: &str = "/usr/share/nginx/html";
pub const DEFAULT_DATABASE: &str = "drywall.db";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Server settings. Read from `DRYWALL_*` environment variables, the command
/// line may override individual fields afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Writable directory holding the mirror files
    pub root: PathBuf,
    /// SQLite database file
    pub database: PathBuf,
    pub host: String,
    pub port: u16,
    /// Upper bound for a single database or filesystem operation
    pub timeout: Duration,
    /// Upper bound for a whole request
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            database: PathBuf::from(DEFAULT_DATABASE),
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source, defaults filling the gaps.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(root) = lookup("DRYWALL_ROOT") {
            config.root = PathBuf::from(root);
        }
        if let Some(database) = lookup("DRYWALL_DATABASE") {
            config.database = database_path(&database);
        }
        if let Some(host) = lookup("DRYWALL_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("DRYWALL_PORT") {
            config.port = parse("DRYWALL_PORT", port)?;
        }
        if let Some(secs) = lookup("DRYWALL_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse("DRYWALL_TIMEOUT_SECS", secs)?);
        }
        if let Some(secs) = lookup("DRYWALL_REQUEST_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse("DRYWALL_REQUEST_TIMEOUT_SECS", secs)?);
        }
        if let Some(bytes) = lookup("DRYWALL_MAX_BODY_BYTES") {
            config.max_body_bytes = parse("DRYWALL_MAX_BODY_BYTES", bytes)?;
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| ConfigError::Invalid {
            key: "DRYWALL_HOST",
            value: self.host.clone(),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Accepts a plain path or a `sqlite://` style connection string.
#[must_use]
pub fn database_path(connection: &str) -> PathBuf {
    let path = connection
        .strip_prefix("sqlite://")
        .or_else(|| connection.strip_prefix("sqlite:"))
        .unwrap_or(connection);
    PathBuf::from(path)
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}
