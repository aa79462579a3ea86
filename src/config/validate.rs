// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{LivenessConfig, RawServerConfig, ServerConfig};
use crate::errors::{Result, ServerError};

impl TryFrom<RawServerConfig> for ServerConfig {
    type Error = ServerError;

    fn try_from(raw: RawServerConfig) -> std::result::Result<Self, Self::Error> {
        validate_server_section(&raw)?;
        let liveness = validate_liveness_section(&raw)?;
        Ok(ServerConfig::new_unchecked(raw.server, liveness))
    }
}

fn validate_server_section(cfg: &RawServerConfig) -> Result<()> {
    // Port range is deliberately not checked here; bootstrap owns that
    // failure class and its exit code.
    if cfg.server.bind_address.trim().is_empty() {
        return Err(ServerError::ConfigError(
            "[server].bind_address must not be empty".to_string(),
        ));
    }

    if let Some(path) = &cfg.server.log_file {
        if path.as_os_str().is_empty() {
            return Err(ServerError::ConfigError(
                "[server].log_file must not be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_liveness_section(cfg: &RawServerConfig) -> Result<LivenessConfig> {
    let section = &cfg.liveness;

    let checkin_interval = parse_duration(&section.checkin_interval).map_err(|e| {
        ServerError::ConfigError(format!("[liveness].checkin_interval: {e}"))
    })?;
    if checkin_interval.is_zero() {
        return Err(ServerError::ConfigError(
            "[liveness].checkin_interval must be greater than zero".to_string(),
        ));
    }

    if section.max_missed_checkins == 0 {
        return Err(ServerError::ConfigError(
            "[liveness].max_missed_checkins must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(LivenessConfig {
        checkin_url: section
            .checkin_url
            .clone()
            .filter(|url| !url.trim().is_empty()),
        checkin_interval,
        max_missed_checkins: section.max_missed_checkins,
    })
}

/// Parse a duration string like `"500ms"`, `"5s"`, `"1m"` or `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
