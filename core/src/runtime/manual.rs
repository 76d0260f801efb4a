//! Deterministic clock and scheduler driven by explicit time advances.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{Clock, Scheduler, TimerHandle, TimerTask};

/// Clock whose time only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Move time forward. Going backwards is ignored.
    pub fn set(&self, now: f64) {
        if now > self.now.get() {
            self.now.set(now);
        }
    }

    pub fn advance(&self, delta: f64) {
        self.set(self.now.get() + delta.max(0.0));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Timer queue ordered by due time, then by insertion.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    clock: ManualClock,
    next_handle: u64,
    // (due time bits, handle) keeps ordering stable for equal due times
    pending: BTreeMap<(u64, TimerHandle), TimerTask>,
}

/// Order-preserving key for non-negative f64 due times.
fn due_key(t: f64) -> u64 {
    t.max(0.0).to_bits()
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            next_handle: 1,
            pending: BTreeMap::new(),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.keys().any(|(_, h)| *h == handle)
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn schedule(&mut self, delay: f64, task: TimerTask) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let due = self.clock.now() + delay.max(0.0);
        self.pending.insert((due_key(due), handle), task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let key = self.pending.keys().find(|(_, h)| *h == handle).copied();
        match key {
            Some(key) => self.pending.remove(&key).is_some(),
            None => false,
        }
    }

    /// Pop the earliest task due at or before `until`, moving the clock to
    /// its due time. Returns `None` once nothing else is due; the clock is
    /// then left at `until`.
    ///
    /// Tasks are handed out one at a time so that a task which schedules
    /// another task that is also due before `until` still fires in order.
    fn pop_due(&mut self, until: f64) -> Option<TimerTask> {
        let first = self.pending.keys().next().copied();
        match first {
            Some(key) if f64::from_bits(key.0) <= until => {
                let task = self.pending.remove(&key)?;
                self.clock.set(f64::from_bits(key.0));
                Some(task)
            }
            _ => {
                self.clock.set(until);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ConsumerId;

    #[test]
    fn test_tasks_fire_in_due_order() {
        let mut sched = ManualScheduler::new(ManualClock::new(0.0));
        sched.schedule(2.0, TimerTask::RosterRescan);
        sched.schedule(1.0, TimerTask::ActivityCheck);

        assert_eq!(sched.pop_due(5.0), Some(TimerTask::ActivityCheck));
        assert_eq!(sched.now(), 1.0);
        assert_eq!(sched.pop_due(5.0), Some(TimerTask::RosterRescan));
        assert_eq!(sched.pop_due(5.0), None);
        assert_eq!(sched.now(), 5.0);
    }

    #[test]
    fn test_cancel_removes_task() {
        let mut sched = ManualScheduler::new(ManualClock::new(0.0));
        let h = sched.schedule(1.0, TimerTask::Recompute(ConsumerId::Damage));
        assert!(sched.cancel(h));
        assert!(!sched.cancel(h));
        assert_eq!(sched.pop_due(10.0), None);
    }

    #[test]
    fn test_not_due_yet() {
        let mut sched = ManualScheduler::new(ManualClock::new(10.0));
        sched.schedule(3.0, TimerTask::ActivityCheck);
        assert_eq!(sched.pop_due(12.0), None);
        assert_eq!(sched.pending_count(), 1);
        assert_eq!(sched.pop_due(13.0), Some(TimerTask::ActivityCheck));
    }

    #[test]
    fn test_clock_never_moves_backwards() {
        let clock = ManualClock::new(5.0);
        clock.set(3.0);
        assert_eq!(clock.now(), 5.0);
        clock.advance(-1.0);
        assert_eq!(clock.now(), 5.0);
    }
}
