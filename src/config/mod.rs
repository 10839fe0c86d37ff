//! Configuration module for the status board.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 60;
const DEFAULT_IO_TIMEOUT_MS: u64 = 5_000;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding the refresh endpoint (open when unset)
    pub admin_psk: Option<String>,
    /// Directory holding notice records (`*.txt`)
    pub notices_dir: PathBuf,
    /// Monitoring snapshot JSON written by the external monitor
    pub snapshot_path: PathBuf,
    /// Declarative service/category catalog (TOML)
    pub catalog_path: PathBuf,
    /// Time-to-live of the notice cache
    pub notice_ttl: Duration,
    /// Time-to-live of the service cache
    pub service_ttl: Duration,
    /// Upper bound on the source I/O of a single refresh
    pub io_timeout: Duration,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_psk = lookup("STATUS_ADMIN_PSK").filter(|psk| !psk.is_empty());

        let notices_dir = lookup("STATUS_NOTICES_DIR")
            .unwrap_or_else(|| "./data/notices".to_string())
            .into();

        let snapshot_path = lookup("STATUS_SNAPSHOT_PATH")
            .unwrap_or_else(|| "./data/status.json".to_string())
            .into();

        let catalog_path = lookup("STATUS_CATALOG_PATH")
            .unwrap_or_else(|| "./data/services.toml".to_string())
            .into();

        let notice_ttl = Duration::from_secs(parse_or_default(
            &lookup,
            "STATUS_NOTICE_TTL_SECS",
            DEFAULT_TTL_SECS,
        ));
        let service_ttl = Duration::from_secs(parse_or_default(
            &lookup,
            "STATUS_SERVICE_TTL_SECS",
            DEFAULT_TTL_SECS,
        ));
        let io_timeout = Duration::from_millis(parse_or_default(
            &lookup,
            "STATUS_IO_TIMEOUT_MS",
            DEFAULT_IO_TIMEOUT_MS,
        ));

        let bind_addr = lookup("STATUS_BIND_ADDR")
            .and_then(|raw| match raw.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!("Ignoring invalid STATUS_BIND_ADDR {:?}: {}", raw, e);
                    None
                }
            })
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

        let log_level = lookup("STATUS_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = lookup("STATUS_LOG_FORMAT")
            .is_some_and(|format| format.eq_ignore_ascii_case("json"));

        Self {
            admin_psk,
            notices_dir,
            snapshot_path,
            catalog_path,
            notice_ttl,
            service_ttl,
            io_timeout,
            bind_addr,
            log_level,
            log_json,
        }
    }
}

fn parse_or_default<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {} value {:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}
