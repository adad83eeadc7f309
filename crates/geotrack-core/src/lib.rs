//! Tracking session state machine and sample pipeline for geotrackd
//!
//! This crate is the heart of geotrackd, containing:
//! - The session state machine (Stopped <-> Recording)
//! - The aggregator that fans in both position sources through one gate
//! - Reverse geocoding with a bounded wait, and record persistence
//! - The delayed automatic restart and the foreground lease

mod aggregator;
mod engine;
mod events;
mod foreground;
mod geocode;
mod restart;
mod session;
mod writer;

pub use aggregator::*;
pub use engine::*;
pub use events::*;
pub use foreground::*;
pub use geocode::*;
pub use restart::*;
pub use session::*;
pub use writer::*;
