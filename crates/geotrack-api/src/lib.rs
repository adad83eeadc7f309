//! Data model and protocol types for geotrackd
//!
//! This crate defines the stable API between geotrackd and clients:
//! - Samples, records and tracking configuration
//! - Commands (requests from clients) and responses
//! - Events (service -> clients)
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
