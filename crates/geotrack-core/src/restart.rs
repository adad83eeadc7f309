//! Delayed automatic restart

use geotrack_api::RestartInfo;
use geotrack_host_api::{AlarmPayload, AlarmScheduler, HostError};
use geotrack_util::MemberId;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("Scheduling refused: {0}")]
    Scheduling(#[from] HostError),
}

/// The single outstanding restart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRestart {
    pub member_id: MemberId,
    pub interval_ms: i64,
    pub fire_at_ms: i64,
    generation: u64,
}

impl ScheduledRestart {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn info(&self) -> RestartInfo {
        RestartInfo {
            member_id: self.member_id.clone(),
            interval_ms: self.interval_ms,
            fire_at_ms: self.fire_at_ms,
        }
    }

    fn payload(&self) -> AlarmPayload {
        AlarmPayload {
            member_id: self.member_id.clone(),
            interval_ms: self.interval_ms,
            generation: self.generation,
        }
    }
}

/// Arms at most one one-shot wake at a time
pub struct RestartScheduler {
    alarm: Arc<dyn AlarmScheduler>,
    pending: Option<ScheduledRestart>,
    next_generation: u64,
}

impl RestartScheduler {
    pub fn new(alarm: Arc<dyn AlarmScheduler>) -> Self {
        Self {
            alarm,
            pending: None,
            next_generation: 1,
        }
    }

    pub fn pending(&self) -> Option<&ScheduledRestart> {
        self.pending.as_ref()
    }

    /// Replace any pending restart with one firing `delay_seconds` after `now_ms`.
    ///
    /// On refusal nothing is left pending.
    pub fn schedule(
        &mut self,
        member_id: &MemberId,
        interval_ms: i64,
        delay_seconds: u64,
        now_ms: i64,
    ) -> Result<ScheduledRestart, RestartError> {
        self.cancel();

        let delay_ms = i64::try_from(delay_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        let restart = ScheduledRestart {
            member_id: member_id.clone(),
            interval_ms,
            fire_at_ms: now_ms.saturating_add(delay_ms),
            generation: self.next_generation,
        };
        self.next_generation += 1;

        self.alarm.schedule_once(restart.fire_at_ms, restart.payload())?;

        info!(
            member_id = %member_id,
            fire_at_ms = restart.fire_at_ms,
            generation = restart.generation,
            "Automatic restart scheduled"
        );
        self.pending = Some(restart.clone());
        Ok(restart)
    }

    /// Drop the pending restart. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        let Some(restart) = self.pending.take() else {
            return false;
        };

        if let Err(e) = self.alarm.cancel(&restart.payload()) {
            warn!(error = %e, "Failed to cancel restart alarm");
        }
        debug!(generation = restart.generation, "Automatic restart canceled");
        true
    }

    /// Claim a fired wake. Only the current generation is accepted.
    pub fn take_fired(&mut self, payload: &AlarmPayload) -> Option<ScheduledRestart> {
        match &self.pending {
            Some(pending) if pending.generation == payload.generation => self.pending.take(),
            _ => {
                debug!(generation = payload.generation, "Ignoring stale restart wake");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack_host_api::MockAlarm;

    #[test]
    fn schedule_arms_single_alarm() {
        let alarm = Arc::new(MockAlarm::new());
        let mut scheduler = RestartScheduler::new(alarm.clone());
        let member = MemberId::new("m1");

        let first = scheduler.schedule(&member, 60_000, 300, 1_000).unwrap();
        assert_eq!(first.fire_at_ms, 301_000);

        let second = scheduler.schedule(&member, 60_000, 300, 2_000).unwrap();
        assert_ne!(first.generation(), second.generation());
        assert_eq!(alarm.pending().map(|(at, _)| at), Some(302_000));
        assert_eq!(scheduler.pending(), Some(&second));
    }

    #[test]
    fn stale_generation_is_ignored() {
        let alarm = Arc::new(MockAlarm::new());
        let mut scheduler = RestartScheduler::new(alarm.clone());
        let member = MemberId::new("m1");

        let first = scheduler.schedule(&member, 60_000, 300, 0).unwrap();
        let stale = first.payload();
        let second = scheduler.schedule(&member, 60_000, 300, 0).unwrap();

        assert!(scheduler.take_fired(&stale).is_none());
        assert!(scheduler.pending().is_some());
        assert_eq!(scheduler.take_fired(&second.payload()), Some(second.clone()));
        assert!(scheduler.take_fired(&second.payload()).is_none());
    }

    #[test]
    fn cancel_is_idempotent() {
        let alarm = Arc::new(MockAlarm::new());
        let mut scheduler = RestartScheduler::new(alarm.clone());

        assert!(!scheduler.cancel());
        scheduler.schedule(&MemberId::new("m1"), 1_000, 10, 0).unwrap();
        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());
        assert!(alarm.pending().is_none());
    }

    #[test]
    fn refusal_leaves_nothing_pending() {
        let alarm = Arc::new(MockAlarm::new());
        *alarm.refuse.lock().unwrap() = true;
        let mut scheduler = RestartScheduler::new(alarm);

        let result = scheduler.schedule(&MemberId::new("m1"), 1_000, 10, 0);
        assert!(matches!(result, Err(RestartError::Scheduling(_))));
        assert!(scheduler.pending().is_none());
    }
}
