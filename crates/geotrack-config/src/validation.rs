//! Configuration validation

use crate::schema::{RawConfig, RawGeocodeConfig, RawSourcesConfig, RawTrackingConfig};
use geotrack_api::TrackingConfig;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("[tracking] {0}")]
    TrackingError(String),

    #[error("[sources.{source_name}] {message}")]
    SourceError {
        source_name: String,
        message: String,
    },

    #[error("[geocode] {0}")]
    GeocodeError(String),

    #[error("[foreground] {0}")]
    ForegroundError(String),

    #[error("Invalid URL '{value}': {message}")]
    InvalidUrl { value: String, message: String },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_raw_tracking(&config.tracking));
    errors.extend(validate_sources(&config.sources));
    errors.extend(validate_geocode(&config.geocode));

    if let Some(title) = &config.foreground.title
        && title.trim().is_empty()
    {
        errors.push(ValidationError::ForegroundError(
            "title cannot be empty".into(),
        ));
    }

    errors
}

/// Validate a tracking configuration submitted at runtime
pub fn validate_tracking(config: &TrackingConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.interval_seconds == 0 {
        errors.push(ValidationError::TrackingError(
            "interval_seconds must be greater than zero".into(),
        ));
    }

    errors
}

fn validate_raw_tracking(tracking: &RawTrackingConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if tracking.interval_seconds == Some(0) {
        errors.push(ValidationError::TrackingError(
            "interval_seconds must be greater than zero".into(),
        ));
    }

    if let Some(member) = &tracking.member_id
        && member.trim().is_empty()
    {
        errors.push(ValidationError::TrackingError(
            "member_id cannot be blank".into(),
        ));
    }

    if tracking.auto_start_enabled == Some(true) && tracking.member_id.is_none() {
        errors.push(ValidationError::TrackingError(
            "auto_start_enabled requires member_id".into(),
        ));
    }

    errors
}

fn validate_sources(sources: &RawSourcesConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if sources.gpsd.port == Some(0) {
        errors.push(ValidationError::SourceError {
            source_name: "gpsd".into(),
            message: "port cannot be 0".into(),
        });
    }

    if let Some(host) = &sources.gpsd.host
        && host.trim().is_empty()
    {
        errors.push(ValidationError::SourceError {
            source_name: "gpsd".into(),
            message: "host cannot be empty".into(),
        });
    }

    let network = &sources.network;
    match &network.url {
        Some(url) => {
            if let Err(e) = check_http_url(url) {
                errors.push(e);
            }
        }
        None if network.enabled == Some(true) => {
            errors.push(ValidationError::SourceError {
                source_name: "network".into(),
                message: "enabled source requires a url".into(),
            });
        }
        None => {}
    }

    if network.poll_interval_seconds == Some(0) {
        errors.push(ValidationError::SourceError {
            source_name: "network".into(),
            message: "poll_interval_seconds must be greater than zero".into(),
        });
    }

    errors
}

fn validate_geocode(geocode: &RawGeocodeConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(url) = &geocode.url
        && let Err(e) = check_http_url(url)
    {
        errors.push(e);
    }

    if geocode.timeout_ms == Some(0) {
        errors.push(ValidationError::GeocodeError(
            "timeout_ms must be greater than zero".into(),
        ));
    }

    if let Some(agent) = &geocode.user_agent
        && agent.trim().is_empty()
    {
        errors.push(ValidationError::GeocodeError(
            "user_agent cannot be empty".into(),
        ));
    }

    errors
}

fn check_http_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrl {
            value: url.to_string(),
            message: "expected http:// or https://".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;

    fn base() -> RawConfig {
        RawConfig {
            config_version: 1,
            daemon: RawDaemonConfig::default(),
            tracking: RawTrackingConfig::default(),
            sources: RawSourcesConfig::default(),
            geocode: RawGeocodeConfig::default(),
            foreground: RawForegroundConfig::default(),
        }
    }

    #[test]
    fn empty_config_is_valid() {
        assert!(validate_config(&base()).is_empty());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = base();
        config.tracking.interval_seconds = Some(0);
        config.sources.gpsd.port = Some(0);
        config.geocode.url = Some("ftp://example.org".into());

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn auto_start_needs_member() {
        let mut config = base();
        config.tracking.auto_start_enabled = Some(true);
        let errors = validate_config(&config);
        assert!(matches!(errors.as_slice(), [ValidationError::TrackingError(_)]));

        config.tracking.member_id = Some("kid-1".into());
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn enabled_network_source_needs_url() {
        let mut config = base();
        config.sources.network.enabled = Some(true);
        let errors = validate_config(&config);
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::SourceError { source_name, .. }] if source_name == "network"
        ));
    }

    #[test]
    fn runtime_tracking_interval() {
        let config = TrackingConfig {
            interval_seconds: 0,
            ..TrackingConfig::default()
        };
        assert_eq!(validate_tracking(&config).len(), 1);
        assert!(validate_tracking(&TrackingConfig::default()).is_empty());
    }
}
