//! Foreground lease

use geotrack_host_api::{ForegroundVisibility, HostResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Idempotent holder of the "tracking active" indicator
pub struct ForegroundLease {
    visibility: Arc<dyn ForegroundVisibility>,
    title: String,
    text: String,
    held: bool,
}

impl ForegroundLease {
    pub fn new(
        visibility: Arc<dyn ForegroundVisibility>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            visibility,
            title: title.into(),
            text: text.into(),
            held: false,
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn acquire(&mut self) -> HostResult<()> {
        if self.held {
            return Ok(());
        }
        self.visibility.acquire(&self.title, &self.text)?;
        self.held = true;
        debug!("Foreground lease acquired");
        Ok(())
    }

    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        if let Err(e) = self.visibility.release() {
            warn!(error = %e, "Failed to release foreground indicator");
        }
        debug!("Foreground lease released");
    }

    /// Release regardless of local state, e.g. after a crash left it behind
    pub fn force_release(&mut self) {
        self.held = false;
        if let Err(e) = self.visibility.release() {
            warn!(error = %e, "Failed to release foreground indicator");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack_host_api::MockForeground;

    #[test]
    fn acquire_and_release_are_idempotent() {
        let fg = Arc::new(MockForeground::new());
        let mut lease = ForegroundLease::new(fg.clone(), "Tracking", "On");

        lease.release();
        assert_eq!(fg.release_calls(), 0);

        lease.acquire().unwrap();
        lease.acquire().unwrap();
        assert_eq!(fg.acquire_calls(), 1);
        assert!(lease.is_held());

        lease.release();
        lease.release();
        assert_eq!(fg.release_calls(), 1);
        assert!(!fg.is_held());
    }

    #[test]
    fn failed_acquire_is_not_held() {
        let fg = Arc::new(MockForeground::new());
        *fg.fail_acquire.lock().unwrap() = true;
        let mut lease = ForegroundLease::new(fg, "Tracking", "On");

        assert!(lease.acquire().is_err());
        assert!(!lease.is_held());
    }
}
