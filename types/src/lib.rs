//! Shared configuration types for the skirmish telemetry pipeline.
//!
//! Every threshold the pipeline uses lives here so the replay tool, tests and
//! any embedding host read the same serde-backed defaults. The numbers are
//! starting points; hosts are expected to tune them per content type.

pub mod formatting;

use serde::{Deserialize, Serialize};

/// Top-level pipeline configuration, one section per component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub bus: BusConfig,
    pub detector: DetectorConfig,
    pub correlator: CorrelatorConfig,
    pub engine: EngineConfig,
}

impl PipelineConfig {
    /// Check cross-field constraints serde cannot express.
    ///
    /// Returns a human readable description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.bus.max_size == 0 {
            return Err("bus.max_size must be at least 1".into());
        }
        if self.bus.ttl_seconds <= 0.0 {
            return Err("bus.ttl_seconds must be positive".into());
        }
        let d = &self.detector;
        if d.activity_timeout <= 0.0 || d.check_interval <= 0.0 {
            return Err("detector.activity_timeout and check_interval must be positive".into());
        }
        if d.segment_max_events == 0 {
            return Err("detector.segment_max_events must be at least 1".into());
        }
        if d.segment_max_time <= 0.0 || d.segment_gap <= 0.0 {
            return Err("detector.segment_max_time and segment_gap must be positive".into());
        }
        if d.min_duration < 0.0 || d.min_activity_rate < 0.0 {
            return Err("detector finalize thresholds cannot be negative".into());
        }
        if d.max_amount <= 0.0 {
            return Err("detector.max_amount must be positive".into());
        }
        if self.correlator.log_domain_threshold <= 0.0 {
            return Err("correlator.log_domain_threshold must be positive".into());
        }
        let e = &self.engine;
        if e.capacity == 0 {
            return Err("engine.capacity must be at least 1".into());
        }
        if e.window <= 0.0 {
            return Err("engine.window must be positive".into());
        }
        if e.min_interval <= 0.0 || e.max_interval < e.min_interval {
            return Err("engine.min_interval must be positive and <= max_interval".into());
        }
        if e.high_rate <= e.low_rate {
            return Err("engine.high_rate must be greater than low_rate".into());
        }
        Ok(())
    }
}

/// Event bus storage limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Ring capacity; the oldest entry is overwritten beyond this.
    pub max_size: usize,
    /// Entries older than this are hidden from history reads.
    pub ttl_seconds: f64,
    /// Emit a debug line each time the stored size crosses another multiple
    /// of this step. Zero disables it.
    pub size_log_step: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_size: 500,
            ttl_seconds: 30.0,
            size_log_step: 100,
        }
    }
}

/// Session detection and segmentation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Seconds without qualifying activity before a pending session ends.
    pub activity_timeout: f64,
    /// How often the activity timer checks while a timeout is pending.
    pub check_interval: f64,

    pub segment_max_events: usize,
    pub segment_max_time: f64,
    /// Inactivity gap between accepted events that forces a new segment.
    pub segment_gap: f64,
    /// Finalized segments with fewer events are dropped.
    pub segment_min_events: usize,

    pub min_duration: f64,
    pub min_events: usize,
    /// Events per second the whole session must average to be kept.
    pub min_activity_rate: f64,

    /// Pet cache is cleared wholesale once it holds more entries than this.
    pub pet_cache_ceiling: usize,
    /// Minimum spacing between on-demand roster scans for unknown pets.
    pub roster_scan_interval: f64,
    /// Period of the background roster refresh while a session is open.
    pub roster_rescan_interval: f64,

    /// Track sessions outside instanced content.
    pub track_open_world: bool,
    /// Publish every accepted raw tuple on the diagnostic channel.
    pub publish_raw: bool,
    /// Amounts above this are treated as corrupt input.
    pub max_amount: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            activity_timeout: 5.0,
            check_interval: 1.0,
            segment_max_events: 1_000,
            segment_max_time: 30.0,
            segment_gap: 5.0,
            segment_min_events: 5,
            min_duration: 3.0,
            min_events: 10,
            min_activity_rate: 0.5,
            pet_cache_ceiling: 256,
            roster_scan_interval: 2.0,
            roster_rescan_interval: 10.0,
            track_open_world: true,
            publish_raw: true,
            max_amount: 100_000_000.0,
        }
    }
}

/// Clock domain reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Timestamps at or above this magnitude are treated as epoch-like log
    /// clock values; smaller ones as local monotonic seconds.
    pub log_domain_threshold: f64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            log_domain_threshold: 1_000_000_000.0,
        }
    }
}

/// Rate calculation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateMethod {
    Rolling,
    Final,
    #[default]
    Hybrid,
}

/// Per-consumer rate engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ring buffer slots per engine.
    pub capacity: usize,
    /// Trailing window for the rolling method, in seconds.
    pub window: f64,
    /// Hybrid behaves as pure rolling until this much time has elapsed.
    pub hybrid_grace: f64,
    pub method: RateMethod,

    /// Fastest recompute cadence (used when input is quiet).
    pub min_interval: f64,
    /// Slowest recompute cadence (used under heavy input).
    pub max_interval: f64,
    /// Accepts per second at or below which `min_interval` applies.
    pub low_rate: f64,
    /// Accepts per second at or above which `max_interval` applies.
    pub high_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 1_024,
            window: 5.0,
            hybrid_grace: 3.0,
            method: RateMethod::Hybrid,
            min_interval: 0.1,
            max_interval: 1.0,
            low_rate: 10.0,
            high_rate: 200.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert_eq!(PipelineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
[detector]
activity_timeout = 8.0
segment_max_events = 10

[engine]
method = "rolling"
"#,
        )
        .unwrap();

        assert_eq!(config.detector.activity_timeout, 8.0);
        assert_eq!(config.detector.segment_max_events, 10);
        assert_eq!(config.detector.min_events, DetectorConfig::default().min_events);
        assert_eq!(config.engine.method, RateMethod::Rolling);
        assert_eq!(config.bus, BusConfig::default());
    }

    #[test]
    fn test_validate_rejects_inverted_intervals() {
        let mut config = PipelineConfig::default();
        config.engine.max_interval = 0.05;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_bus() {
        let mut config = PipelineConfig::default();
        config.bus.max_size = 0;
        assert!(config.validate().unwrap_err().contains("max_size"));
    }
}
