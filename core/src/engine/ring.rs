use serde::{Deserialize, Serialize};

use crate::combat_log::UnitFlags;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RingBufferSlot {
    pub amount: f64,
    /// Session-relative seconds.
    pub timestamp: f64,
    pub flags: UnitFlags,
}

/// Fixed-capacity circular buffer. Never allocates past its capacity; the
/// oldest slot is overwritten once full.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    slots: Vec<RingBufferSlot>,
    capacity: usize,
    /// Next slot to write once the buffer is full.
    cursor: usize,
    dropped: u64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            dropped: 0,
        }
    }

    /// Append a slot. Returns true if an old slot was overwritten.
    pub fn push(&mut self, slot: RingBufferSlot) -> bool {
        if self.slots.len() < self.capacity {
            self.slots.push(slot);
            return false;
        }
        self.slots[self.cursor] = slot;
        self.cursor = (self.cursor + 1) % self.capacity;
        self.dropped += 1;
        true
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &RingBufferSlot> {
        let (newer, older) = self.slots.split_at(self.cursor);
        older.iter().chain(newer.iter())
    }

    /// Sum of amounts with `from <= timestamp <= to`.
    pub fn sum_between(&self, from: f64, to: f64) -> f64 {
        self.slots
            .iter()
            .filter(|s| s.timestamp >= from && s.timestamp <= to)
            .map(|s| s.amount)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.cursor = 0;
        self.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(amount: f64, timestamp: f64) -> RingBufferSlot {
        RingBufferSlot {
            amount,
            timestamp,
            flags: UnitFlags::NONE,
        }
    }

    #[test]
    fn test_overwrites_oldest_when_full() {
        let mut ring = RingBuffer::new(3);
        for i in 0..5 {
            ring.push(slot(i as f64, i as f64));
        }

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.dropped(), 2);
        let order: Vec<f64> = ring.iter().map(|s| s.amount).collect();
        assert_eq!(order, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_never_grows_past_capacity() {
        let mut ring = RingBuffer::new(16);
        for i in 0..1_000 {
            ring.push(slot(1.0, i as f64));
            assert!(ring.len() <= 16);
        }
        assert_eq!(ring.dropped(), 1_000 - 16);
    }

    #[test]
    fn test_sum_between_is_inclusive() {
        let mut ring = RingBuffer::new(8);
        for t in [1.0, 2.0, 3.0, 4.0] {
            ring.push(slot(10.0, t));
        }
        assert_eq!(ring.sum_between(2.0, 3.0), 20.0);
        assert_eq!(ring.sum_between(5.0, 9.0), 0.0);
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut ring = RingBuffer::new(2);
        for i in 0..3 {
            ring.push(slot(i as f64, 0.0));
        }
        ring.clear();
        ring.push(slot(7.0, 0.0));
        assert_eq!(ring.iter().map(|s| s.amount).collect::<Vec<_>>(), vec![7.0]);
        assert_eq!(ring.dropped(), 0);
    }
}
