//! Per-consumer rate calculation.
//!
//! Each consumer (damage, healing) owns one [`RateEngine`]. Accepted amounts
//! land in a fixed ring buffer; the displayed rate is recomputed under
//! adaptive throttling so bursts of input do not turn into bursts of work.
//!
//! Time inside the engine is session-relative: slot timestamps come from the
//! correlator and "now" is the scheduler clock minus the session start.

mod ring;
mod subscriber;


use serde::{Deserialize, Serialize};
use skirmish_types::{EngineConfig, RateMethod};

use crate::combat_log::UnitFlags;
use crate::runtime::{ConsumerId, SharedScheduler, TimerHandle, TimerTask, scheduler_now};

pub use ring::{RingBuffer, RingBufferSlot};
pub use subscriber::{ConsumerScope, RateSubscriber};

const HYBRID_ROLLING_WEIGHT: f64 = 0.7;
const HYBRID_FINAL_WEIGHT: f64 = 0.3;

/// Width of the bucket used to estimate the accept rate.
const ACCEPT_RATE_BUCKET: f64 = 1.0;

/// Published state of one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub value: f64,
    pub peak: f64,
    /// Method that produced `value`. `Final` once the engine stopped.
    pub method: RateMethod,
    /// Every accepted amount, paused or not.
    pub total: f64,
    pub elapsed: f64,
    pub recomputes: u64,
    pub dropped: u64,
    pub active: bool,
}

pub struct RateEngine {
    id: ConsumerId,
    config: EngineConfig,
    scheduler: Option<SharedScheduler>,
    ring: RingBuffer,

    active: bool,
    paused: bool,
    /// Local clock time of session start.
    origin: f64,
    /// Elapsed time frozen by `stop`.
    stopped_at: Option<f64>,
    latest_timestamp: f64,

    total: f64,
    /// Amounts accepted while not paused; the `Final` numerator.
    cumulative: f64,

    value: f64,
    peak: f64,
    value_method: RateMethod,
    recomputes: u64,
    last_recompute: Option<f64>,
    timer: Option<TimerHandle>,

    bucket_start: f64,
    bucket_count: u32,
    accept_rate: f64,
    warned_no_scheduler: bool,
}

impl RateEngine {
    pub fn new(id: ConsumerId, config: &EngineConfig) -> Self {
        Self {
            id,
            config: config.clone(),
            scheduler: None,
            ring: RingBuffer::new(config.capacity),
            active: false,
            paused: false,
            origin: 0.0,
            stopped_at: None,
            latest_timestamp: 0.0,
            total: 0.0,
            cumulative: 0.0,
            value: 0.0,
            peak: 0.0,
            value_method: config.method,
            recomputes: 0,
            last_recompute: None,
            timer: None,
            bucket_start: 0.0,
            bucket_count: 0,
            accept_rate: 0.0,
            warned_no_scheduler: false,
        }
    }

    pub fn with_scheduler(mut self, scheduler: SharedScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Estimated accepts per second over the last full bucket.
    pub fn accept_rate(&self) -> f64 {
        self.accept_rate
    }

    /// Seconds since session start. Without a scheduler this is the latest
    /// accepted timestamp.
    pub fn elapsed(&self) -> f64 {
        if let Some(frozen) = self.stopped_at {
            return frozen;
        }
        match scheduler_now(self.scheduler.as_ref()) {
            Some(now) => (now - self.origin).max(0.0),
            None => self.latest_timestamp.max(0.0),
        }
    }

    // --- Lifecycle ---

    /// Reset buffers and counters for a session that started at local clock
    /// time `session_start`.
    pub fn start(&mut self, session_start: f64) {
        self.cancel_timer();
        self.ring.clear();
        self.active = true;
        self.paused = false;
        self.origin = session_start;
        self.stopped_at = None;
        self.latest_timestamp = 0.0;
        self.total = 0.0;
        self.cumulative = 0.0;
        self.value = 0.0;
        self.peak = 0.0;
        self.value_method = self.config.method;
        self.recomputes = 0;
        self.last_recompute = None;
        self.bucket_start = 0.0;
        self.bucket_count = 0;
        self.accept_rate = 0.0;
        tracing::debug!("[ENGINE] {:?} started at {:.3}", self.id, session_start);
    }

    /// Keep recording amounts but leave them out of the `Final` numerator.
    pub fn pause(&mut self) {
        if self.active && !self.paused {
            self.paused = true;
            tracing::debug!("[ENGINE] {:?} paused", self.id);
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            tracing::debug!("[ENGINE] {:?} resumed", self.id);
        }
    }

    /// Freeze elapsed time and publish one last `Final` value.
    pub fn stop(&mut self) {
        let elapsed = self.elapsed();
        self.stop_at(elapsed);
    }

    /// Like [`stop`](Self::stop), with elapsed time frozen at the session's
    /// own duration rather than the current clock.
    pub fn stop_at(&mut self, elapsed: f64) {
        if !self.active {
            return;
        }
        self.cancel_timer();
        let elapsed = elapsed.max(0.0);
        self.stopped_at = Some(elapsed);
        self.value = self.compute_at(RateMethod::Final, elapsed);
        self.value_method = RateMethod::Final;
        self.peak = self.peak.max(self.value);
        self.recomputes += 1;
        self.last_recompute = Some(elapsed);
        self.active = false;
        self.paused = false;
        tracing::info!(
            "[ENGINE] {:?} stopped: {:.1}/s over {:.1}s (peak {:.1})",
            self.id,
            self.value,
            elapsed,
            self.peak
        );
    }

    // --- Input ---

    pub fn accept(&mut self, amount: f64, timestamp: f64, flags: UnitFlags) {
        if !self.active {
            tracing::trace!("[ENGINE] {:?} inactive, dropping {}", self.id, amount);
            return;
        }
        if !amount.is_finite() || amount < 0.0 {
            return;
        }

        self.ring.push(RingBufferSlot {
            amount,
            timestamp,
            flags,
        });
        self.total += amount;
        if !self.paused {
            self.cumulative += amount;
        }
        self.latest_timestamp = self.latest_timestamp.max(timestamp);

        let now = self.elapsed();
        self.note_accept(now);
        self.throttle(now);
    }

    fn note_accept(&mut self, now: f64) {
        let span = now - self.bucket_start;
        if span >= ACCEPT_RATE_BUCKET {
            self.accept_rate = self.bucket_count as f64 / span;
            self.bucket_start = now;
            self.bucket_count = 0;
        }
        self.bucket_count += 1;
    }

    // --- Throttling ---

    /// Recompute interval for the current accept rate, interpolated between
    /// `min_interval` (quiet) and `max_interval` (busy).
    pub fn recompute_interval(&self) -> f64 {
        let c = &self.config;
        let spread = c.high_rate - c.low_rate;
        let t = if spread > 0.0 {
            ((self.accept_rate - c.low_rate) / spread).clamp(0.0, 1.0)
        } else {
            0.0
        };
        c.min_interval + (c.max_interval - c.min_interval) * t
    }

    fn throttle(&mut self, now: f64) {
        let interval = self.recompute_interval();
        let since = self.last_recompute.map(|last| now - last);
        if since.is_none_or(|s| s >= interval) {
            self.cancel_timer();
            self.recompute();
            return;
        }
        if self.timer.is_some() {
            return;
        }
        let delay = interval - since.unwrap_or(0.0);
        match &self.scheduler {
            Some(scheduler) => {
                self.timer = Some(scheduler.borrow_mut().schedule(delay, TimerTask::Recompute(self.id)));
            }
            None if !self.warned_no_scheduler => {
                tracing::warn!("[ENGINE] {:?} has no scheduler, deferred recomputes skipped", self.id);
                self.warned_no_scheduler = true;
            }
            None => {}
        }
    }

    fn cancel_timer(&mut self) {
        if let (Some(scheduler), Some(handle)) = (&self.scheduler, self.timer.take()) {
            scheduler.borrow_mut().cancel(handle);
        }
    }

    /// Deferred recompute fired.
    pub fn on_timer(&mut self) {
        self.timer = None;
        if self.active {
            self.recompute();
        }
    }

    /// Recompute the configured method now and update the peak.
    pub fn recompute(&mut self) {
        let elapsed = self.elapsed();
        self.value = self.compute_at(self.config.method, elapsed);
        self.value_method = self.config.method;
        self.peak = self.peak.max(self.value);
        self.recomputes += 1;
        self.last_recompute = Some(elapsed);
        tracing::trace!("[ENGINE] {:?} {:.1}/s at {:.2}s", self.id, self.value, elapsed);
    }

    // --- Calculation ---

    pub fn compute(&self, method: RateMethod) -> f64 {
        self.compute_at(method, self.elapsed())
    }

    /// Rate under `method` as of `elapsed` seconds into the session.
    pub fn compute_at(&self, method: RateMethod, elapsed: f64) -> f64 {
        if elapsed <= 0.0 {
            return 0.0;
        }
        match method {
            RateMethod::Rolling => self.rolling(elapsed),
            RateMethod::Final => self.cumulative / elapsed,
            RateMethod::Hybrid if elapsed > self.config.hybrid_grace => {
                HYBRID_ROLLING_WEIGHT * self.rolling(elapsed)
                    + HYBRID_FINAL_WEIGHT * (self.cumulative / elapsed)
            }
            RateMethod::Hybrid => self.rolling(elapsed),
        }
    }

    fn rolling(&self, elapsed: f64) -> f64 {
        let window = self.config.window;
        let span = window.min(elapsed);
        if span <= 0.0 {
            return 0.0;
        }
        self.ring.sum_between(elapsed - window, elapsed) / span
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            value: self.value,
            peak: self.peak,
            method: self.value_method,
            total: self.total,
            elapsed: self.elapsed(),
            recomputes: self.recomputes,
            dropped: self.ring.dropped(),
            active: self.active,
        }
    }
}
