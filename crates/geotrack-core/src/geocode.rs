//! Reverse geocoding with a bounded wait

use geotrack_host_api::Geocoder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default upper bound on one lookup
pub const DEFAULT_GEOCODE_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves coordinates to an address, absorbing every failure as `None`
#[derive(Clone)]
pub struct GeocodeResolver {
    geocoder: Option<Arc<dyn Geocoder>>,
    timeout: Duration,
}

impl GeocodeResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, timeout: Duration) -> Self {
        Self {
            geocoder: Some(geocoder),
            timeout,
        }
    }

    /// A resolver that never produces an address
    pub fn disabled() -> Self {
        Self {
            geocoder: None,
            timeout: DEFAULT_GEOCODE_TIMEOUT,
        }
    }

    pub async fn resolve(&self, latitude: f64, longitude: f64) -> Option<String> {
        let geocoder = self.geocoder.as_ref()?;

        match tokio::time::timeout(self.timeout, geocoder.reverse_geocode(latitude, longitude))
            .await
        {
            Ok(Ok(Some(address))) if !address.trim().is_empty() => Some(address),
            Ok(Ok(_)) => {
                debug!(latitude, longitude, "No address for position");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Reverse geocoding failed");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Reverse geocoding timed out"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack_host_api::{GeocodeBehavior, MockGeocoder};

    fn resolver(behavior: GeocodeBehavior) -> GeocodeResolver {
        GeocodeResolver::new(
            Arc::new(MockGeocoder::new(behavior)),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn resolves_address() {
        let r = resolver(GeocodeBehavior::Address("1 Main St".into()));
        assert_eq!(r.resolve(1.0, 2.0).await.as_deref(), Some("1 Main St"));
    }

    #[tokio::test]
    async fn failures_become_none() {
        assert!(resolver(GeocodeBehavior::Fail).resolve(1.0, 2.0).await.is_none());
        assert!(resolver(GeocodeBehavior::NoMatch).resolve(1.0, 2.0).await.is_none());
        assert!(resolver(GeocodeBehavior::Address("  ".into()))
            .resolve(1.0, 2.0)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn hanging_geocoder_times_out() {
        let r = resolver(GeocodeBehavior::Hang);
        assert!(r.resolve(1.0, 2.0).await.is_none());
    }

    #[tokio::test]
    async fn disabled_resolver() {
        assert!(GeocodeResolver::disabled().resolve(1.0, 2.0).await.is_none());
    }
}
