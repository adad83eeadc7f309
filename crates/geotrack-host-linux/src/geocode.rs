//! Nominatim reverse geocoder

use async_trait::async_trait;
use geotrack_host_api::{Geocoder, HostError, HostResult};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

/// Extract the display address from a `/reverse?format=jsonv2` body
pub fn parse_reverse_response(body: &str) -> HostResult<Option<String>> {
    let response: ReverseResponse = serde_json::from_str(body)
        .map_err(|e| HostError::GeocodeFailed(format!("unexpected response: {e}")))?;

    if let Some(error) = response.error {
        debug!(error = %error, "Geocoder returned no match");
        return Ok(None);
    }

    Ok(response.display_name.filter(|name| !name.trim().is_empty()))
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// `base_url` is the service root, e.g. `https://nominatim.openstreetmap.org`
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> HostResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| HostError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn reverse_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}/reverse?format=jsonv2&lat={}&lon={}",
            self.base_url, latitude, longitude
        )
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> HostResult<Option<String>> {
        let url = self.reverse_url(latitude, longitude);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HostError::GeocodeFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HostError::GeocodeFailed(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| HostError::GeocodeFailed(e.to_string()))?;

        parse_reverse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_name() {
        let body = r#"{"place_id":1,"lat":"52.5","lon":"13.4","display_name":"Unter den Linden, Berlin, Germany"}"#;
        assert_eq!(
            parse_reverse_response(body).unwrap().as_deref(),
            Some("Unter den Linden, Berlin, Germany")
        );
    }

    #[test]
    fn error_body_is_no_match() {
        let body = r#"{"error":"Unable to geocode"}"#;
        assert_eq!(parse_reverse_response(body).unwrap(), None);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_reverse_response("<html>").is_err());
    }

    #[test]
    fn builds_reverse_url() {
        let geocoder = NominatimGeocoder::new(
            "https://geo.example.org/",
            "geotrackd-test",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            geocoder.reverse_url(52.5, 13.4),
            "https://geo.example.org/reverse?format=jsonv2&lat=52.5&lon=13.4"
        );
    }
}
