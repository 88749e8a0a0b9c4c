//! # Missed-tick policies.
//!
//! A [`Timer`](crate::timer::Timer) asks its [`MissedTickPolicy`] where to
//! place the next deadline every time it fires. The policy is consulted
//! *after* the deadline has passed, with the actual wake time, so the whole
//! spectrum between "never lose a tick" and "never burst" is a pure function
//! of three values:
//!
//! - [`TriggerAllMissed`] catches up: one tick per missed interval, deadlines
//!   stay on the original grid.
//! - [`SkipMissedAndResync`] skips missed ticks but locks the phase back to
//!   the original grid.
//! - [`SkipMissedAndDrift`] skips missed ticks and restarts the interval from
//!   the actual wake time, accepting phase drift for honest spacing.
//!
//! Implement the trait to supply a custom policy; implementations are
//! expected to be stateless.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Decides where the next deadline goes once a tick has fired.
///
/// `now` is the wake time on the monotonic clock and `scheduled` the deadline
/// that just fired (`now >= scheduled` always holds). The returned deadline
/// must be in the future relative to `scheduled`.
pub trait MissedTickPolicy: fmt::Debug + Send + Sync {
    /// Computes the deadline of the tick after the one that just fired.
    fn next_deadline(&self, now: Instant, scheduled: Instant, interval: Duration) -> Instant;
}

/// Trigger one tick per missed interval until the timer catches up.
///
/// The next deadline is always `scheduled + interval`: a delayed task gets a
/// burst of immediate ticks, one for every interval it slept through, and the
/// grid never drifts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerAllMissed;

impl MissedTickPolicy for TriggerAllMissed {
    fn next_deadline(&self, _now: Instant, scheduled: Instant, interval: Duration) -> Instant {
        scheduled + interval
    }
}

/// Skip missed ticks and resynchronize with the original grid.
///
/// After a delay the timer fires once, then waits for the next multiple of
/// `interval` counted from the original start. No bursts, no drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipMissedAndResync;

impl MissedTickPolicy for SkipMissedAndResync {
    fn next_deadline(&self, now: Instant, scheduled: Instant, interval: Duration) -> Instant {
        let lateness = now - scheduled;
        let periods_behind = (lateness.as_nanos() / interval.as_nanos()) as u32;
        scheduled + interval * (periods_behind + 1)
    }
}

/// Skip missed ticks and restart the interval from the wake time.
///
/// Behaves as if the timer were reset on every delayed tick: the phase is
/// abandoned in favor of a full `interval` of spacing from `now`. Delays up
/// to `delay_tolerance` are forgiven and do not move the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipMissedAndDrift {
    delay_tolerance: Duration,
}

impl SkipMissedAndDrift {
    /// A policy that forgives delays up to `tolerance` before drifting.
    pub fn with_tolerance(tolerance: Duration) -> Self {
        Self {
            delay_tolerance: tolerance,
        }
    }

    /// The maximum delay that does not cause drift.
    pub fn delay_tolerance(&self) -> Duration {
        self.delay_tolerance
    }
}

impl MissedTickPolicy for SkipMissedAndDrift {
    fn next_deadline(&self, now: Instant, scheduled: Instant, interval: Duration) -> Instant {
        if now - scheduled > self.delay_tolerance {
            now + interval
        } else {
            scheduled + interval
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn trigger_all_missed_stays_on_the_grid() {
        let start = Instant::now();
        let policy = TriggerAllMissed;
        // Three intervals late: the next deadline still only advances by one.
        let next = policy.next_deadline(start + secs(4), start + secs(1), secs(1));
        assert_eq!(next, start + secs(2));
    }

    #[test]
    fn resync_jumps_to_the_next_grid_point_after_now() {
        let start = Instant::now();
        let policy = SkipMissedAndResync;
        let next = policy.next_deadline(
            start + Duration::from_millis(3500),
            start + secs(1),
            secs(1),
        );
        assert_eq!(next, start + secs(4));

        // An exact multiple lands one full interval later.
        let next = policy.next_deadline(start + secs(3), start + secs(1), secs(1));
        assert_eq!(next, start + secs(4));
    }

    #[test]
    fn drift_restarts_from_now_when_late() {
        let start = Instant::now();
        let policy = SkipMissedAndDrift::default();
        let next = policy.next_deadline(start + secs(5), start + secs(1), secs(1));
        assert_eq!(next, start + secs(6));
    }

    #[test]
    fn drift_tolerance_forgives_small_delays() {
        let start = Instant::now();
        let policy = SkipMissedAndDrift::with_tolerance(Duration::from_millis(100));
        let next = policy.next_deadline(
            start + Duration::from_millis(1050),
            start + secs(1),
            secs(1),
        );
        assert_eq!(next, start + secs(2));
    }
}
