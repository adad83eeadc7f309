//! Location permission backed by the user's consent setting

use geotrack_host_api::PermissionGate;
use std::sync::atomic::{AtomicBool, Ordering};

/// Grants location access exactly when tracking is enabled in the settings
pub struct ConsentGate {
    granted: AtomicBool,
}

impl ConsentGate {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

impl PermissionGate for ConsentGate {
    fn has_location_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_consent() {
        let gate = ConsentGate::new(false);
        assert!(!gate.has_location_permission());
        gate.set_granted(true);
        assert!(gate.has_location_permission());
    }
}
