//! Shared minimum-interval gate

use std::sync::{Mutex, PoisonError};

/// A single-value gate enforcing a minimum interval between accepted events.
///
/// Every producer shares one gate, so two sources firing at nearly the same
/// moment cannot both get through. Rejected events are simply dropped: the
/// gate never queues or retries.
#[derive(Debug, Default)]
pub struct ThrottleGate {
    last_accepted: Mutex<Option<i64>>,
}

impl ThrottleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to pass the gate at `now_ms`.
    ///
    /// Returns `true` and records `now_ms` when nothing has been accepted yet
    /// or at least `interval_ms` has elapsed since the last acceptance.
    /// Otherwise returns `false` and leaves the gate untouched.
    pub fn try_accept(&self, now_ms: i64, interval_ms: i64) -> bool {
        let mut last = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let open = match *last {
            None => true,
            Some(prev) => now_ms.saturating_sub(prev) >= interval_ms,
        };

        if open {
            *last = Some(now_ms);
        }
        open
    }

    /// Timestamp of the most recent accepted event
    pub fn last_accepted(&self) -> Option<i64> {
        *self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget the last acceptance so the next event passes
    pub fn reset(&self) {
        *self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn first_event_always_passes() {
        let gate = ThrottleGate::new();
        assert!(gate.try_accept(5_000, 60_000));
        assert_eq!(gate.last_accepted(), Some(5_000));
    }

    #[test]
    fn rejects_inside_window_without_side_effects() {
        let gate = ThrottleGate::new();
        assert!(gate.try_accept(5_000, 60_000));
        assert!(!gate.try_accept(5_100, 60_000));
        assert_eq!(gate.last_accepted(), Some(5_000));

        assert!(gate.try_accept(65_200, 60_000));
        assert_eq!(gate.last_accepted(), Some(65_200));
    }

    #[test]
    fn boundary_is_inclusive() {
        let gate = ThrottleGate::new();
        assert!(gate.try_accept(0, 1_000));
        assert!(gate.try_accept(1_000, 1_000));
    }

    #[test]
    fn older_events_are_rejected() {
        let gate = ThrottleGate::new();
        assert!(gate.try_accept(100_000, 1_000));
        assert!(!gate.try_accept(10_000, 1_000));
    }

    #[test]
    fn reset_reopens_gate() {
        let gate = ThrottleGate::new();
        assert!(gate.try_accept(1_000, 60_000));
        gate.reset();
        assert_eq!(gate.last_accepted(), None);
        assert!(gate.try_accept(1_001, 60_000));
    }

    #[test]
    fn concurrent_callers_accept_exactly_once() {
        let gate = Arc::new(ThrottleGate::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let gate = gate.clone();
                std::thread::spawn(move || gate.try_accept(10_000 + i, 60_000))
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 1);
    }

    proptest! {
        #[test]
        fn accepted_events_are_spaced_by_interval(
            times in prop::collection::vec(0i64..1_000_000, 1..200),
            interval in 1i64..120_000,
        ) {
            let gate = ThrottleGate::new();
            let accepted: Vec<i64> = times
                .into_iter()
                .filter(|t| gate.try_accept(*t, interval))
                .collect();

            for pair in accepted.windows(2) {
                prop_assert!(pair[1] - pair[0] >= interval);
            }
        }
    }
}
