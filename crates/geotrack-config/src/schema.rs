//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    #[serde(default)]
    pub daemon: RawDaemonConfig,

    #[serde(default)]
    pub tracking: RawTrackingConfig,

    #[serde(default)]
    pub sources: RawSourcesConfig,

    #[serde(default)]
    pub geocode: RawGeocodeConfig,

    #[serde(default)]
    pub foreground: RawForegroundConfig,
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDaemonConfig {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/geotrackd/geotrackd.sock)
    pub socket_path: Option<PathBuf>,

    /// Log directory
    pub log_dir: Option<PathBuf>,

    /// Data directory for the record store and tracking.toml
    pub data_dir: Option<PathBuf>,
}

/// Tracking defaults. Overridden by `<data_dir>/tracking.toml` when present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTrackingConfig {
    /// Location consent
    pub enabled: Option<bool>,

    pub interval_seconds: Option<u64>,

    pub auto_restart_delay_seconds: Option<u64>,

    /// Resume tracking `member_id` when the daemon starts
    pub auto_start_enabled: Option<bool>,

    /// Default member for auto-start
    pub member_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSourcesConfig {
    #[serde(default)]
    pub gpsd: RawGpsdConfig,

    #[serde(default)]
    pub network: RawNetworkConfig,
}

/// Precise source: a gpsd daemon
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawGpsdConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub enabled: Option<bool>,
}

/// Approximate source: an HTTP geolocation endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawNetworkConfig {
    pub url: Option<String>,
    pub poll_interval_seconds: Option<u64>,
    pub enabled: Option<bool>,
}

/// Reverse geocoding service
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawGeocodeConfig {
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
    pub enabled: Option<bool>,
}

/// Text of the "tracking active" indicator
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawForegroundConfig {
    pub title: Option<String>,
    pub text: Option<String>,
}
