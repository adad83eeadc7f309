//! IPC layer for geotrackd
//!
//! One JSON document per line over a Unix domain socket. Requests and
//! responses are correlated by `request_id`; subscribed clients also receive
//! [`geotrack_api::Event`] lines interleaved with responses. The peer UID
//! decides the client role.

mod client;
mod server;

pub use client::*;
pub use server::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

pub type IpcResult<T> = Result<T, IpcError>;
