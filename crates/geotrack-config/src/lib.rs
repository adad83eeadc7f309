//! Configuration parsing and validation for geotrackd
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Tracking defaults and the auto-start member
//! - Position source, geocoder and foreground indicator settings
//! - Validation with clear error messages
//!
//! The user-editable tracking settings are additionally persisted to
//! `tracking.toml` in the data directory, which overrides `[tracking]`.

mod schema;
mod settings;
mod tracking_file;
mod validation;

pub use schema::*;
pub use settings::*;
pub use tracking_file::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Settings> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Settings::from_raw(raw))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let settings = parse_config("config_version = 1").unwrap();
        assert_eq!(settings.tracking.interval_seconds, 60);
        assert_eq!(settings.gpsd.port, DEFAULT_GPSD_PORT);
        assert!(settings.default_member.is_none());
        assert!(!settings.network.enabled);
    }

    #[test]
    fn parse_full_config() {
        let config = r#"
            config_version = 1

            [daemon]
            socket_path = "/tmp/geotrack-test.sock"
            data_dir = "/tmp/geotrack-data"

            [tracking]
            interval_seconds = 30
            auto_restart_delay_seconds = 120
            auto_start_enabled = true
            member_id = "kid-1"

            [sources.gpsd]
            host = "gps.local"
            port = 2948

            [sources.network]
            url = "http://localhost:9000/locate"
            poll_interval_seconds = 15

            [geocode]
            enabled = false

            [foreground]
            title = "Tracking kid-1"
        "#;

        let settings = parse_config(config).unwrap();
        assert_eq!(settings.daemon.socket_path, Path::new("/tmp/geotrack-test.sock"));
        assert_eq!(settings.tracking.interval_ms(), 30_000);
        assert_eq!(settings.tracking.auto_restart_delay_seconds, 120);
        assert!(settings.tracking.auto_start_enabled);
        assert_eq!(settings.default_member.as_ref().map(|m| m.as_str()), Some("kid-1"));
        assert_eq!(settings.gpsd.host, "gps.local");
        assert!(settings.network.enabled);
        assert!(!settings.geocode.enabled);
        assert_eq!(settings.foreground.title, "Tracking kid-1");
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_values() {
        let config = r#"
            config_version = 1

            [tracking]
            interval_seconds = 0
        "#;
        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }
}
