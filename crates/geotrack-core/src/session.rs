//! Session state and command types

use geotrack_api::TrackingStatus;
use geotrack_host_api::HostError;
use geotrack_util::MemberId;
use thiserror::Error;

use crate::ScheduledRestart;

/// State of the single tracking session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingSessionState {
    pub status: TrackingStatus,
    /// Member being tracked, or the last one tracked once stopped
    pub member_id: Option<MemberId>,
    pub interval_ms: i64,
    pub started_at_ms: Option<i64>,
}

impl TrackingSessionState {
    pub fn stopped() -> Self {
        Self {
            status: TrackingStatus::Stopped,
            member_id: None,
            interval_ms: 0,
            started_at_ms: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.status == TrackingStatus::Recording
    }
}

/// Commands accepted by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingCommand {
    StartTracking { member_id: MemberId, interval_ms: i64 },
    StopTracking { auto_resume: bool },
    /// Issued only by a fired restart wake
    AutoRestart { member_id: MemberId, interval_ms: i64 },
}

/// Result of a session command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Started { member_id: MemberId, interval_ms: i64 },
    AlreadyRecording { member_id: MemberId },
    Stopped { restart: Option<ScheduledRestart> },
    NotRecording,
}

/// Reasons a start is refused before anything is touched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("member id is empty")]
    MissingMember,

    #[error("interval must be positive, got {0} ms")]
    InvalidInterval(i64),

    #[error("location permission not granted")]
    PermissionDenied,
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigUpdateError {
    #[error("tracking is active; stop it before changing settings")]
    SessionActive,
}
