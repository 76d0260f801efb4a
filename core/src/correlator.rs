//! Session-relative time from two clock domains.
//!
//! Raw events arrive stamped either with the host's local monotonic clock
//! (seconds since boot) or with the combat log clock (epoch-like seconds that
//! can lag behind). The correlator maps both onto "seconds since this session
//! started". Which domain a value belongs to is decided by magnitude alone,
//! there is no handshake with the host, so the threshold is configuration.

use skirmish_types::CorrelatorConfig;

#[derive(Debug, Clone)]
pub struct TimestampCorrelator {
    log_domain_threshold: f64,
    /// Local clock time at session start.
    baseline: Option<f64>,
    /// `first_log_timestamp - baseline`, learned from the first log-domain
    /// value seen in the session.
    offset: Option<f64>,
    /// Frozen duration once the session ended.
    final_duration: Option<f64>,
}

impl TimestampCorrelator {
    pub fn new(config: &CorrelatorConfig) -> Self {
        Self {
            log_domain_threshold: config.log_domain_threshold,
            baseline: None,
            offset: None,
            final_duration: None,
        }
    }

    /// Record `local_now` as the session baseline and forget the learned
    /// domain offset.
    pub fn start_session(&mut self, local_now: f64) {
        self.baseline = Some(local_now);
        self.offset = None;
        self.final_duration = None;
    }

    /// Freeze the session duration. Relative lookups keep working.
    pub fn end_session(&mut self, local_now: f64) {
        if let Some(baseline) = self.baseline {
            self.final_duration = Some((local_now - baseline).max(0.0));
        }
    }

    pub fn is_log_domain(&self, timestamp: f64) -> bool {
        timestamp >= self.log_domain_threshold
    }

    /// Seconds since session start for a timestamp from either domain.
    ///
    /// Before any session has started the timestamp is returned unchanged.
    pub fn relative_time(&mut self, timestamp: f64) -> f64 {
        let Some(baseline) = self.baseline else {
            return timestamp;
        };
        if self.is_log_domain(timestamp) {
            let offset = *self.offset.get_or_insert_with(|| {
                tracing::debug!(
                    "[CORRELATOR] learned log clock offset from first timestamp {:.3}",
                    timestamp
                );
                timestamp - baseline
            });
            timestamp - (baseline + offset)
        } else {
            timestamp - baseline
        }
    }

    pub fn is_running(&self) -> bool {
        self.baseline.is_some() && self.final_duration.is_none()
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    pub fn learned_offset(&self) -> Option<f64> {
        self.offset
    }

    /// Frozen duration of the last ended session.
    pub fn duration(&self) -> Option<f64> {
        self.final_duration
    }
}
