//! In-process one-shot timer
//!
//! The wake does not outlive the daemon. A restart that was pending when the
//! process died is not replayed; startup reconciliation and auto-start cover
//! that case.

use geotrack_host_api::{AlarmPayload, AlarmScheduler, HostError, HostResult};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct TimerAlarm {
    fired_tx: mpsc::UnboundedSender<AlarmPayload>,
    fired_rx: Mutex<Option<mpsc::UnboundedReceiver<AlarmPayload>>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl TimerAlarm {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fired_tx: tx,
            fired_rx: Mutex::new(Some(rx)),
            pending: Mutex::new(None),
        }
    }

    fn abort_pending(&self) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Default for TimerAlarm {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmScheduler for TimerAlarm {
    fn schedule_once(&self, at_ms: i64, payload: AlarmPayload) -> HostResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HostError::SchedulingRefused(format!("no async runtime: {e}")))?;

        self.abort_pending();

        let delay_ms = at_ms.saturating_sub(geotrack_util::now_ms()).max(0) as u64;
        let tx = self.fired_tx.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            debug!(generation = payload.generation, "Restart timer fired");
            let _ = tx.send(payload);
        });

        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        debug!(at_ms, delay_ms, "Restart timer armed");
        Ok(())
    }

    fn cancel(&self, _payload: &AlarmPayload) -> HostResult<()> {
        if self.abort_pending() {
            debug!("Restart timer canceled");
        }
        Ok(())
    }

    fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<AlarmPayload>> {
        self.fired_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack_util::MemberId;

    fn payload(generation: u64) -> AlarmPayload {
        AlarmPayload {
            member_id: MemberId::new("m1"),
            interval_ms: 60_000,
            generation,
        }
    }

    #[tokio::test]
    async fn fires_once_at_deadline() {
        let alarm = TimerAlarm::new();
        let mut rx = alarm.take_receiver().unwrap();

        alarm
            .schedule_once(geotrack_util::now_ms() + 20, payload(1))
            .unwrap();
        let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.generation, 1);
    }

    #[tokio::test]
    async fn reschedule_replaces_and_cancel_silences() {
        let alarm = TimerAlarm::new();
        let mut rx = alarm.take_receiver().unwrap();
        let now = geotrack_util::now_ms();

        alarm.schedule_once(now + 20, payload(1)).unwrap();
        alarm.schedule_once(now + 40, payload(2)).unwrap();
        let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.generation, 2);

        alarm.schedule_once(now + 20, payload(3)).unwrap();
        alarm.cancel(&payload(3)).unwrap();
        alarm.cancel(&payload(3)).unwrap();
        assert!(tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .is_err());
    }

    #[test]
    fn refuses_without_runtime() {
        let alarm = TimerAlarm::new();
        assert!(matches!(
            alarm.schedule_once(0, payload(1)),
            Err(HostError::SchedulingRefused(_))
        ));
    }
}
