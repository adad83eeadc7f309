//! Shared utilities for geotrackd
//!
//! This crate provides:
//! - ID types (MemberId, RecordId, ClientId)
//! - Time utilities (epoch milliseconds, local day bounds, mock time)
//! - The shared throttle gate used by all position sources
//! - Default paths for socket, data, config and log directories

mod ids;
mod paths;
mod throttle;
mod time;

pub use ids::*;
pub use paths::*;
pub use throttle::*;
pub use time::*;
