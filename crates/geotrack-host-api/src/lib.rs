//! Host collaborator interfaces for geotrackd
//!
//! This crate defines the boundary between the tracking core and the
//! platform: position sources, permission checks, reverse geocoding,
//! one-shot wake-ups and the foreground indicator. It contains no platform
//! code itself; `MockHost` components are provided for tests.

mod fix;
mod mock;
mod traits;

pub use fix::*;
pub use mock::*;
pub use traits::*;
