//! Clock and scheduler abstractions.
//!
//! The core never reads wall time or spawns timers on its own. The host
//! injects a [`Clock`] for "now" and a [`Scheduler`] for delayed work, which
//! lets the state machine and the rate engines run against a deterministic
//! [`ManualScheduler`] in tests and in log replay.

mod manual;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

pub use manual::{ManualClock, ManualScheduler};

/// Monotonic time source, in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall-clock monotonic time measured from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Identifies one rate engine within a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerId {
    Damage,
    Healing,
}

/// Work items a timer can carry back to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    /// Detector: check elapsed time since last qualifying activity.
    ActivityCheck,
    /// Detector: periodic group roster / pet ownership refresh.
    RosterRescan,
    /// Rate engine: run a throttled recompute.
    Recompute(ConsumerId),
}

/// Cancelable handle for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// Host-provided timer service.
///
/// Tasks are plain values; whoever drains the scheduler routes them back to
/// the component that asked for them. Cancelling an unknown or already
/// fired handle is a no-op.
pub trait Scheduler {
    fn now(&self) -> f64;
    fn schedule(&mut self, delay: f64, task: TimerTask) -> TimerHandle;
    /// Returns true if a pending task was removed.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
    /// Remove and return the earliest task due at or before `until`.
    fn pop_due(&mut self, until: f64) -> Option<TimerTask>;
}

/// Scheduler shared by the detector and every rate engine of one pipeline.
///
/// Execution is single threaded, so a `RefCell` is sufficient; borrows are
/// never held across calls back into other components.
pub type SharedScheduler = Rc<RefCell<dyn Scheduler>>;

/// Read the current time from an optional shared scheduler.
pub(crate) fn scheduler_now(scheduler: Option<&SharedScheduler>) -> Option<f64> {
    scheduler.map(|s| s.borrow().now())
}
