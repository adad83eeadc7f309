//! Linux host adapters for geotrackd
//!
//! Provides:
//! - gpsd client as the precise position source
//! - HTTP geolocation polling as the approximate position source
//! - Nominatim reverse geocoding
//! - In-process one-shot timers for automatic restart
//! - A runtime status file as the "tracking active" indicator
//! - A consent flag as the location permission gate

mod alarm;
mod foreground;
mod geocode;
mod gpsd;
mod network;
mod permission;

pub use alarm::*;
pub use foreground::*;
pub use geocode::*;
pub use gpsd::*;
pub use network::*;
pub use permission::*;
