//! Validated settings structures

use crate::schema::{
    RawConfig, RawDaemonConfig, RawForegroundConfig, RawGeocodeConfig, RawGpsdConfig,
    RawNetworkConfig, RawTrackingConfig,
};
use geotrack_api::TrackingConfig;
use geotrack_util::{default_data_dir, default_log_dir, socket_path_without_env, MemberId};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GPSD_HOST: &str = "127.0.0.1";
pub const DEFAULT_GPSD_PORT: u16 = 2947;
pub const DEFAULT_GEOCODE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_GEOCODE_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_NETWORK_POLL_SECONDS: u64 = 60;

/// Validated settings ready for use by the daemon
#[derive(Debug, Clone)]
pub struct Settings {
    pub daemon: DaemonConfig,

    /// Tracking defaults from the main config file
    pub tracking: TrackingConfig,

    /// Member resumed by auto-start
    pub default_member: Option<MemberId>,

    pub gpsd: GpsdConfig,
    pub network: NetworkConfig,
    pub geocode: GeocodeConfig,
    pub foreground: ForegroundConfig,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let default_member = raw.tracking.member_id.clone().map(MemberId::new);

        Self {
            daemon: DaemonConfig::from_raw(raw.daemon),
            tracking: tracking_from_raw(&raw.tracking),
            default_member,
            gpsd: GpsdConfig::from_raw(raw.sources.gpsd),
            network: NetworkConfig::from_raw(raw.sources.network),
            geocode: GeocodeConfig::from_raw(raw.geocode),
            foreground: ForegroundConfig::from_raw(raw.foreground),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            tracking: TrackingConfig::default(),
            default_member: None,
            gpsd: GpsdConfig::default(),
            network: NetworkConfig::default(),
            geocode: GeocodeConfig::default(),
            foreground: ForegroundConfig::default(),
        }
    }
}

fn tracking_from_raw(raw: &RawTrackingConfig) -> TrackingConfig {
    let defaults = TrackingConfig::default();
    TrackingConfig {
        enabled: raw.enabled.unwrap_or(defaults.enabled),
        interval_seconds: raw.interval_seconds.unwrap_or(defaults.interval_seconds),
        auto_restart_delay_seconds: raw
            .auto_restart_delay_seconds
            .unwrap_or(defaults.auto_restart_delay_seconds),
        auto_start_enabled: raw.auto_start_enabled.unwrap_or(defaults.auto_start_enabled),
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub log_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl DaemonConfig {
    fn from_raw(raw: RawDaemonConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(socket_path_without_env),
            log_dir: raw.log_dir.unwrap_or_else(default_log_dir),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::from_raw(RawDaemonConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct GpsdConfig {
    pub host: String,
    pub port: u16,
    pub enabled: bool,
}

impl GpsdConfig {
    fn from_raw(raw: RawGpsdConfig) -> Self {
        Self {
            host: raw.host.unwrap_or_else(|| DEFAULT_GPSD_HOST.to_string()),
            port: raw.port.unwrap_or(DEFAULT_GPSD_PORT),
            enabled: raw.enabled.unwrap_or(true),
        }
    }
}

impl Default for GpsdConfig {
    fn default() -> Self {
        Self::from_raw(RawGpsdConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub url: Option<String>,
    pub poll_interval: Duration,
    /// Defaults to on when a url is configured
    pub enabled: bool,
}

impl NetworkConfig {
    fn from_raw(raw: RawNetworkConfig) -> Self {
        let enabled = raw.enabled.unwrap_or(raw.url.is_some()) && raw.url.is_some();
        Self {
            url: raw.url,
            poll_interval: Duration::from_secs(
                raw.poll_interval_seconds
                    .unwrap_or(DEFAULT_NETWORK_POLL_SECONDS),
            ),
            enabled,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::from_raw(RawNetworkConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct GeocodeConfig {
    pub url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub enabled: bool,
}

impl GeocodeConfig {
    fn from_raw(raw: RawGeocodeConfig) -> Self {
        Self {
            url: raw.url.unwrap_or_else(|| DEFAULT_GEOCODE_URL.to_string()),
            user_agent: raw
                .user_agent
                .unwrap_or_else(|| format!("geotrackd/{}", env!("CARGO_PKG_VERSION"))),
            timeout: Duration::from_millis(raw.timeout_ms.unwrap_or(DEFAULT_GEOCODE_TIMEOUT_MS)),
            enabled: raw.enabled.unwrap_or(true),
        }
    }
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self::from_raw(RawGeocodeConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct ForegroundConfig {
    pub title: String,
    pub text: String,
}

impl ForegroundConfig {
    fn from_raw(raw: RawForegroundConfig) -> Self {
        Self {
            title: raw.title.unwrap_or_else(|| "Location tracking".to_string()),
            text: raw
                .text
                .unwrap_or_else(|| "Recording location in the background".to_string()),
        }
    }
}

impl Default for ForegroundConfig {
    fn default() -> Self {
        Self::from_raw(RawForegroundConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_enabled_follows_url() {
        let off = NetworkConfig::from_raw(RawNetworkConfig::default());
        assert!(!off.enabled);

        let on = NetworkConfig::from_raw(RawNetworkConfig {
            url: Some("http://localhost:8080/locate".into()),
            ..Default::default()
        });
        assert!(on.enabled);
        assert_eq!(on.poll_interval, Duration::from_secs(60));

        let forced_off = NetworkConfig::from_raw(RawNetworkConfig {
            url: Some("http://localhost:8080/locate".into()),
            enabled: Some(false),
            ..Default::default()
        });
        assert!(!forced_off.enabled);
    }

    #[test]
    fn tracking_defaults_fill_gaps() {
        let tracking = tracking_from_raw(&RawTrackingConfig {
            interval_seconds: Some(30),
            ..Default::default()
        });
        assert_eq!(tracking.interval_seconds, 30);
        assert_eq!(tracking.auto_restart_delay_seconds, 300);
        assert!(tracking.enabled);
        assert!(!tracking.auto_start_enabled);
    }

    #[test]
    fn geocode_defaults() {
        let geocode = GeocodeConfig::default();
        assert_eq!(geocode.url, DEFAULT_GEOCODE_URL);
        assert_eq!(geocode.timeout, Duration::from_secs(5));
        assert!(geocode.user_agent.starts_with("geotrackd/"));
    }
}
