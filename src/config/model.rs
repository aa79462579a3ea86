// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [server]
/// port = 1099
/// hostname = "modeling-host"
/// bind_address = "0.0.0.0"
/// log_file = "logs/hms-server.log"
///
/// [liveness]
/// checkin_url = "hms://gui-host:1099/ClientCheckIn"
/// checkin_interval = "5s"
/// max_missed_checkins = 3
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub liveness: LivenessSection,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Registry port. Kept signed so that out-of-range values from the
    /// config file reach bootstrap and fail there with the invalid-port exit
    /// code instead of a parse error.
    #[serde(default = "default_port")]
    pub port: i64,

    /// Hostname used in the published address.
    ///
    /// If `None`, the machine hostname is used (falling back to
    /// `localhost`).
    #[serde(default)]
    pub hostname: Option<String>,

    /// Interface the registry and the command listener bind to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Optional session log file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_port() -> i64 {
    1099
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            hostname: None,
            bind_address: default_bind_address(),
            log_file: None,
        }
    }
}

/// `[liveness]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LivenessSection {
    /// Address of the check-in authority, e.g.
    /// `hms://gui-host:1099/ClientCheckIn`.
    #[serde(default)]
    pub checkin_url: Option<String>,

    /// Duration string (`"500ms"`, `"5s"`, `"1m"`).
    #[serde(default = "default_checkin_interval")]
    pub checkin_interval: String,

    /// Consecutive failed heartbeats after which the client is assumed gone.
    #[serde(default = "default_max_missed_checkins")]
    pub max_missed_checkins: u32,
}

fn default_checkin_interval() -> String {
    "5s".to_string()
}

fn default_max_missed_checkins() -> u32 {
    3
}

impl Default for LivenessSection {
    fn default() -> Self {
        Self {
            checkin_url: None,
            checkin_interval: default_checkin_interval(),
            max_missed_checkins: default_max_missed_checkins(),
        }
    }
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: i64,
    pub hostname: Option<String>,
    pub bind_address: String,
    pub log_file: Option<PathBuf>,
    pub liveness: LivenessConfig,
}

#[derive(Debug, Clone)]
pub struct LivenessConfig {
    pub checkin_url: Option<String>,
    pub checkin_interval: Duration,
    pub max_missed_checkins: u32,
}

impl ServerConfig {
    pub(crate) fn new_unchecked(server: ServerSection, liveness: LivenessConfig) -> Self {
        Self {
            port: server.port,
            hostname: server.hostname.filter(|h| !h.trim().is_empty()),
            bind_address: server.bind_address,
            log_file: server.log_file,
            liveness,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            hostname: None,
            bind_address: default_bind_address(),
            log_file: None,
            liveness: LivenessConfig::default(),
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            checkin_url: None,
            checkin_interval: Duration::from_secs(5),
            max_missed_checkins: default_max_missed_checkins(),
        }
    }
}
