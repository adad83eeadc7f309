//! Command types for the geotrackd protocol

use geotrack_util::{ClientId, MemberId, RecordId};
use serde::{Deserialize, Serialize};

use crate::{HealthStatus, LocationRecord, TrackingConfig, TrackingStateView, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    /// Start refused: missing member, bad interval or no location permission
    PreconditionFailed,
    /// Client role does not allow the command
    PermissionDenied,
    /// Operation requires tracking to be stopped
    SessionActive,
    NotFound,
    StoreError,
    HostError,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get current tracking state
    GetStatus,

    /// Start tracking a member. Uses the configured interval when omitted.
    StartTracking {
        member_id: MemberId,
        interval_ms: Option<i64>,
    },

    /// Stop tracking, optionally arming an automatic restart
    StopTracking {
        #[serde(default)]
        auto_resume: bool,
    },

    /// Records for a member in `[start_ms, end_ms]`
    QueryRecords {
        member_id: MemberId,
        start_ms: i64,
        end_ms: i64,
    },

    /// Number of records written today (local time)
    CountToday { member_id: MemberId },

    /// Timestamp of the newest record
    LastRecordTime { member_id: MemberId },

    /// Delete one record
    DeleteRecord { record_id: RecordId },

    /// Get the active tracking configuration
    GetConfig,

    /// Replace the tracking configuration (only while stopped)
    UpdateConfig { config: TrackingConfig },

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Get health status
    GetHealth,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Status(TrackingStateView),
    Started { member_id: MemberId, interval_ms: i64 },
    AlreadyRecording { member_id: MemberId },
    Stopped { restart_at_ms: Option<i64> },
    NotRecording,
    Records(Vec<LocationRecord>),
    Count { count: u64 },
    LastRecordTime { timestamp_ms: Option<i64> },
    Deleted,
    Config(TrackingConfig),
    ConfigUpdated,
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Health(HealthStatus),
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = Request::new(
            7,
            Command::StartTracking {
                member_id: MemberId::new("m1"),
                interval_ms: Some(60_000),
            },
        );
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"start_tracking\""));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, 7);
        assert!(matches!(
            parsed.command,
            Command::StartTracking { interval_ms: Some(60_000), .. }
        ));
    }

    #[test]
    fn stop_defaults_to_no_resume() {
        let parsed: Command = serde_json::from_str(r#"{"type":"stop_tracking"}"#).unwrap();
        assert!(matches!(parsed, Command::StopTracking { auto_resume: false }));
    }

    #[test]
    fn error_response_serialization() {
        let resp = Response::error(
            3,
            ErrorInfo::new(ErrorCode::PreconditionFailed, "member id is empty"),
        );
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("precondition_failed"));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed.result,
            ResponseResult::Err(ErrorInfo { code: ErrorCode::PreconditionFailed, .. })
        ));
    }
}
