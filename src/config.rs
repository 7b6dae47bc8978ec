//! Server configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the HTTP API binds to.
    pub port: u16,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Idle lifetime of a login session.
    pub session_ttl: Duration,
    /// How often the expiry sweep archives lapsed memos.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/memoflow.db"),
            session_ttl: Duration::from_secs(8 * 3600),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl ServerConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("MEMOFLOW_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let db_path = std::env::var("MEMOFLOW_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let session_ttl = std::env::var("MEMOFLOW_SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_ttl);

        let sweep_interval = std::env::var("MEMOFLOW_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.sweep_interval);

        Self {
            port,
            db_path,
            session_ttl,
            sweep_interval,
        }
    }
}
