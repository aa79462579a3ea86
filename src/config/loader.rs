// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawServerConfig, ServerConfig};
use crate::errors::Result;

/// Environment variable naming the session log file.
pub const ENV_LOG_FILE: &str = "HMS_SERVER_LOG";
/// Environment variable naming the check-in authority address.
pub const ENV_CHECKIN_URL: &str = "HMS_CLIENT_CHECKIN_URL";
/// Environment variable overriding the published hostname.
pub const ENV_HOSTNAME: &str = "HMS_SERVER_HOSTNAME";

/// Load a configuration file from a given path and return the raw config.
///
/// This only performs TOML deserialization; validation happens in
/// [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawServerConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawServerConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ServerConfig> {
    let raw_config = load_from_path(&path)?;
    let config = ServerConfig::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the effective configuration for a process.
///
/// - With a path, the file must exist and validate.
/// - Without one, defaults are used.
///
/// Environment overrides from the process environment are applied on top.
pub fn resolve(path: Option<&Path>) -> Result<ServerConfig> {
    let raw = match path {
        Some(p) => load_from_path(p)?,
        None => RawServerConfig::default(),
    };
    let raw = apply_env_overrides(raw, |key| std::env::var(key).ok());
    ServerConfig::try_from(raw)
}

/// Apply environment overrides using the given lookup.
///
/// Empty values are ignored so that `HMS_SERVER_LOG=` does not turn the log
/// into an empty path.
pub fn apply_env_overrides<F>(mut raw: RawServerConfig, lookup: F) -> RawServerConfig
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(log) = non_empty(ENV_LOG_FILE) {
        debug!(log_file = %log, "session log overridden from environment");
        raw.server.log_file = Some(PathBuf::from(log));
    }
    if let Some(url) = non_empty(ENV_CHECKIN_URL) {
        debug!(checkin_url = %url, "check-in address overridden from environment");
        raw.liveness.checkin_url = Some(url);
    }
    if let Some(host) = non_empty(ENV_HOSTNAME) {
        raw.server.hostname = Some(host);
    }

    raw
}
