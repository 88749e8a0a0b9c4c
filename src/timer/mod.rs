//! # Timer: a periodic receiver of drift measurements.
//!
//! A [`Timer`] is a [`Receiver`] whose messages are [`Duration`] **drifts**:
//! the difference between the moment a tick actually fired and the moment it
//! was scheduled, measured on the runtime's monotonic clock. A tick that
//! fires on time has (close to) zero drift; a delayed task sees the delay
//! reflected in the drift and in the behavior of the configured
//! [`MissedTickPolicy`].
//!
//! ## Rules
//! - The timer starts armed: the first deadline is one interval away
//!   (or `start_delay` away, when constructed with one).
//! - [`stop()`](Timer::stop) terminates the timer; a later
//!   [`reset()`](Timer::reset) revives it.
//! - Resets take effect immediately, even for a `ready()` already suspended
//!   on the old deadline — the waiter recomputes against the new one. Use
//!   [`handle()`](Timer::handle) to reset or stop from another task.
//!
//! ```no_run
//! use std::time::Duration;
//! use taskbus::{Receiver, Timer};
//!
//! # async fn demo() {
//! let mut timer = Timer::periodic(Duration::from_secs(1));
//! while let Ok(drift) = timer.receive().await {
//!     println!("tick ({drift:?} late)");
//! }
//! # }
//! ```

mod policy;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};

use crate::error::ReceiverStopped;
use crate::receiver::Receiver;

pub use policy::{MissedTickPolicy, SkipMissedAndDrift, SkipMissedAndResync, TriggerAllMissed};

struct State {
    deadline: Instant,
    stopped: bool,
    /// Drift computed by `ready()`, handed out by `consume()`. A stopped
    /// timer still hands out a drift that was already earned.
    pending_drift: Option<Duration>,
}

struct Shared {
    interval: Duration,
    state: Mutex<State>,
    /// Signaled on reset and stop so in-flight waits recompute.
    changed: Notify,
}

/// A receiver that produces a tick (its drift) every `interval`.
pub struct Timer {
    shared: Arc<Shared>,
    policy: Arc<dyn MissedTickPolicy>,
}

impl Timer {
    /// Creates a timer with the given interval and missed-tick policy,
    /// first firing one interval from now.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn new(interval: Duration, policy: impl MissedTickPolicy + 'static) -> Self {
        Self::build(interval, Arc::new(policy), interval)
    }

    /// Creates a timer whose first deadline is `start_delay` from now;
    /// subsequent ticks follow the regular interval.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn with_start_delay(
        interval: Duration,
        policy: impl MissedTickPolicy + 'static,
        start_delay: Duration,
    ) -> Self {
        Self::build(interval, Arc::new(policy), start_delay)
    }

    /// A timer that never loses a tick: delayed ticks are delivered in a
    /// burst and the schedule stays on the original grid
    /// ([`TriggerAllMissed`]).
    pub fn periodic(interval: Duration) -> Self {
        Self::new(interval, TriggerAllMissed)
    }

    /// A timer suited for timeouts: a delayed tick rearms the full interval
    /// from the wake time ([`SkipMissedAndDrift`]).
    pub fn timeout(interval: Duration) -> Self {
        Self::new(interval, SkipMissedAndDrift::default())
    }

    fn build(interval: Duration, policy: Arc<dyn MissedTickPolicy>, first_delay: Duration) -> Self {
        assert!(!interval.is_zero(), "timer interval must be positive");
        Self {
            shared: Arc::new(Shared {
                interval,
                state: Mutex::new(State {
                    deadline: Instant::now() + first_delay,
                    stopped: false,
                    pending_drift: None,
                }),
                changed: Notify::new(),
            }),
            policy,
        }
    }

    /// The interval between ticks.
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// The policy applied when ticks are missed.
    pub fn missed_tick_policy(&self) -> &dyn MissedTickPolicy {
        self.policy.as_ref()
    }

    /// Whether the timer is currently running (not stopped).
    pub fn is_running(&self) -> bool {
        !self.shared.state.lock().stopped
    }

    /// A cloneable handle for resetting or stopping this timer from other
    /// tasks.
    pub fn handle(&self) -> TimerHandle {
        TimerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Restarts the schedule: the next tick fires one interval from now.
    /// Revives a stopped timer.
    pub fn reset(&self) {
        self.handle().reset();
    }

    /// Restarts the schedule with the next tick `delay` from now.
    pub fn reset_after(&self, delay: Duration) {
        self.handle().reset_after(delay);
    }

    /// Stops the timer: `ready()` returns terminated until a reset.
    pub fn stop(&self) {
        self.handle().stop();
    }
}

#[async_trait]
impl Receiver<Duration> for Timer {
    async fn ready(&mut self) -> bool {
        loop {
            let notified = self.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let deadline = {
                let mut state = self.shared.state.lock();
                if state.pending_drift.is_some() {
                    return true;
                }
                if state.stopped {
                    return false;
                }
                let now = Instant::now();
                if now >= state.deadline {
                    let scheduled = state.deadline;
                    state.pending_drift = Some(now - scheduled);
                    state.deadline = self.policy.next_deadline(now, scheduled, self.shared.interval);
                    return true;
                }
                state.deadline
            };

            // Sleep to the deadline, but wake early if the schedule changes.
            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = &mut notified => {}
            }
        }
    }

    fn consume(&mut self) -> Result<Duration, ReceiverStopped> {
        let mut state = self.shared.state.lock();
        if let Some(drift) = state.pending_drift.take() {
            return Ok(drift);
        }
        if state.stopped {
            return Err(ReceiverStopped::new());
        }
        panic!("`consume()` requires a preceding successful `ready()`");
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        write!(
            f,
            "Timer<interval={:?}, policy={:?}, running={}>",
            self.shared.interval,
            self.policy,
            !state.stopped,
        )
    }
}

/// A handle to reset or stop a [`Timer`] from another task.
///
/// Created with [`Timer::handle`]. Cheap to clone.
#[derive(Clone)]
pub struct TimerHandle {
    shared: Arc<Shared>,
}

impl TimerHandle {
    /// Restarts the schedule: the next tick fires one interval from now.
    /// Revives a stopped timer.
    pub fn reset(&self) {
        self.reset_after(self.shared.interval);
    }

    /// Restarts the schedule with the next tick `delay` from now.
    ///
    /// Safe to call while the timer is suspended in `ready()` on another
    /// task: the waiter recomputes against the new deadline.
    pub fn reset_after(&self, delay: Duration) {
        {
            let mut state = self.shared.state.lock();
            state.stopped = false;
            state.deadline = Instant::now() + delay;
            state.pending_drift = None;
        }
        self.shared.changed.notify_waiters();
    }

    /// Stops the timer. An already-earned tick can still be consumed;
    /// everything after that reports termination until a reset.
    pub fn stop(&self) {
        self.shared.state.lock().stopped = true;
        self.shared.changed.notify_waiters();
    }
}
