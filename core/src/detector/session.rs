//! Session and segment records built by the detector.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use skirmish_types::DetectorConfig;

use super::host::GroupContext;
use super::pets::PetOwnershipEntry;
use crate::combat_log::CombatEvent;

static SESSION_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Alphabet for the short hash: no 0/O or 1/I so it can be typed back.
const HASH_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Build a session id from wall-clock millis, the process-wide counter and
/// a one-byte checksum, e.g. `18c2f3a41b7-0003-5e`.
pub fn generate_session_id(millis: i64) -> String {
    let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    let body = format!("{:x}-{:04x}", millis.max(0), counter & 0xffff);
    let checksum = body.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
    format!("{body}-{checksum:02x}")
}

/// Four character hash derived from a session id.
pub fn short_hash(id: &str) -> String {
    let mut hash = fnv1a(id.as_bytes());
    let mut out = String::with_capacity(4);
    for _ in 0..4 {
        out.push(HASH_ALPHABET[(hash & 31) as usize] as char);
        hash >>= 5;
    }
    out
}

/// Bounded run of accepted events inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub index: usize,
    /// Session-relative seconds.
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub events: Vec<CombatEvent>,
    pub event_count: usize,
}

impl Segment {
    pub fn new(session_id: &str, index: usize, start_time: f64) -> Self {
        Self {
            id: format!("{session_id}-{index}"),
            index,
            start_time,
            end_time: None,
            events: Vec::new(),
            event_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.event_count == 0
    }

    pub fn last_time(&self) -> Option<f64> {
        self.events.last().map(|e| e.time)
    }

    pub fn push(&mut self, event: CombatEvent) {
        if self.is_empty() {
            self.start_time = event.time;
        }
        self.events.push(event);
        self.event_count += 1;
    }

    /// Whether appending an event at `time` must open a new segment first.
    pub fn should_split(&self, time: f64, config: &DetectorConfig) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.event_count >= config.segment_max_events {
            return true;
        }
        if time - self.start_time > config.segment_max_time {
            return true;
        }
        self.last_time().is_some_and(|last| time - last >= config.segment_gap)
    }

    pub fn finalize(&mut self) {
        self.end_time = Some(self.last_time().unwrap_or(self.start_time));
    }

    pub fn duration(&self) -> f64 {
        self.end_time
            .map(|end| (end - self.start_time).max(0.0))
            .unwrap_or(0.0)
    }
}

/// One tracked combat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub hash: String,
    /// Wall-clock start, for storage ordering.
    pub started_at: DateTime<Utc>,
    /// Local clock time the session started.
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub duration_seconds: f64,
    pub event_count: usize,
    pub events: Vec<CombatEvent>,
    /// guid -> last seen name
    pub guid_map: HashMap<String, String>,
    pub segments: Vec<Segment>,
    pub discarded_segments: usize,
    pub pets: HashMap<String, PetOwnershipEntry>,
    pub player: String,
    pub zone: String,
    pub group_context: GroupContext,
}

impl Session {
    pub fn new(
        start_time: f64,
        player: String,
        zone: String,
        group_context: GroupContext,
        events: Vec<CombatEvent>,
    ) -> Self {
        let started_at = Utc::now();
        let id = generate_session_id(started_at.timestamp_millis());
        let hash = short_hash(&id);
        Self {
            id,
            hash,
            started_at,
            start_time,
            end_time: None,
            duration_seconds: 0.0,
            event_count: 0,
            events,
            guid_map: HashMap::new(),
            segments: Vec::new(),
            discarded_segments: 0,
            pets: HashMap::new(),
            player,
            zone,
            group_context,
        }
    }

    /// Close the session at `end_time`; earlier values clamp to the start.
    pub fn end(&mut self, end_time: f64) {
        let end = end_time.max(self.start_time);
        self.end_time = Some(end);
        self.duration_seconds = end - self.start_time;
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn activity_rate(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            return 0.0;
        }
        self.event_count as f64 / self.duration_seconds
    }

    /// Minimum-activity criteria a session must meet to be stored.
    pub fn meets_criteria(&self, config: &DetectorConfig) -> bool {
        self.duration_seconds >= config.min_duration
            && self.event_count >= config.min_events
            && self.activity_rate() >= config.min_activity_rate
    }

    /// Attach `segment` if it holds enough events, otherwise count it as
    /// discarded. Empty segments are dropped silently.
    pub fn attach_segment(&mut self, mut segment: Segment, min_events: usize) {
        if segment.is_empty() {
            return;
        }
        segment.finalize();
        if segment.event_count >= min_events {
            self.segments.push(segment);
        } else {
            tracing::debug!(
                "[SESSION] {} dropping segment {} with {} events",
                self.hash,
                segment.index,
                segment.event_count
            );
            self.discarded_segments += 1;
        }
    }
}

/// Recycled event buffers from discarded sessions.
#[derive(Debug, Default)]
pub struct BufferPool {
    buffers: Vec<Vec<CombatEvent>>,
}

impl BufferPool {
    const MAX_POOLED: usize = 4;

    pub fn take(&mut self) -> Vec<CombatEvent> {
        self.buffers.pop().unwrap_or_default()
    }

    pub fn give(&mut self, mut buffer: Vec<CombatEvent>) {
        if self.buffers.len() < Self::MAX_POOLED {
            buffer.clear();
            self.buffers.push(buffer);
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
