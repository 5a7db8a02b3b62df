use std::str::FromStr;
use std::time::Duration;

use plexsync_realtime::channel::realtime_endpoint;

use crate::logging::LogFormat;

const DEFAULT_API_ROOT: &str = "http://localhost:8080";
const DEFAULT_SEARCH_INTERVAL_MS: u64 = 400;

/// A configuration value that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl ConfigError {
    fn new(var: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            var,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// HTTP root of the media backend.
    pub api_root: String,
    /// WebSocket root of the realtime endpoint.
    pub ws_root: String,
    /// Minimum spacing between outbound search requests.
    pub search_interval: Duration,
    /// Drop completed jobs this long after they finish. `None` keeps them.
    pub completed_ttl: Option<Duration>,
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                  |
    /// |-------------------------------|--------------------------|
    /// | `PLEXSYNC_API_ROOT`           | `http://localhost:8080`  |
    /// | `PLEXSYNC_WS_ROOT`            | API root, `ws(s)://`     |
    /// | `PLEXSYNC_SEARCH_INTERVAL_MS` | `400`                    |
    /// | `PLEXSYNC_COMPLETED_TTL_SECS` | unset (never evict)      |
    /// | `PLEXSYNC_LOG_FORMAT`         | `text`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let api_root = get("PLEXSYNC_API_ROOT")
            .unwrap_or_else(|| DEFAULT_API_ROOT.into())
            .trim_end_matches('/')
            .to_string();

        let ws_root = match get("PLEXSYNC_WS_ROOT") {
            Some(v) => v.trim_end_matches('/').to_string(),
            None => derive_ws_root(&api_root).ok_or_else(|| {
                ConfigError::new(
                    "PLEXSYNC_API_ROOT",
                    &api_root,
                    "must start with http:// or https:// when PLEXSYNC_WS_ROOT is unset",
                )
            })?,
        };

        let search_interval_ms: u64 =
            parse_var(&get, "PLEXSYNC_SEARCH_INTERVAL_MS")?.unwrap_or(DEFAULT_SEARCH_INTERVAL_MS);

        let completed_ttl = parse_var::<u64, _>(&get, "PLEXSYNC_COMPLETED_TTL_SECS")?
            .map(Duration::from_secs);

        let log_format: LogFormat = parse_var(&get, "PLEXSYNC_LOG_FORMAT")?.unwrap_or_default();

        Ok(Self {
            api_root,
            ws_root,
            search_interval: Duration::from_millis(search_interval_ms),
            completed_ttl,
            log_format,
        })
    }

    /// Full URL of the realtime endpoint.
    pub fn realtime_endpoint(&self) -> String {
        realtime_endpoint(&self.ws_root)
    }
}

/// Swap an `http(s)://` root for the matching `ws(s)://` root.
pub fn derive_ws_root(api_root: &str) -> Option<String> {
    if let Some(rest) = api_root.strip_prefix("https://") {
        Some(format!("wss://{rest}"))
    } else {
        api_root
            .strip_prefix("http://")
            .map(|rest| format!("ws://{rest}"))
    }
}

fn parse_var<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::new(var, &raw, e.to_string())),
    }
}
