//! Capture cost tracking.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Ceilings for the periodic performance advisory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfLimits {
    /// Frames between advisories. Zero disables them.
    pub report_every: u32,
    /// Mean capture+encode cost, in milliseconds, above which to warn.
    pub max_mean_ms: f64,
    /// Single-frame cost, in milliseconds, above which to warn.
    pub max_frame_ms: f64,
}

impl Default for PerfLimits {
    fn default() -> Self {
        Self {
            report_every: 1000,
            max_mean_ms: 5.0,
            max_frame_ms: 20.0,
        }
    }
}

/// Running mean and maximum of per-frame cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerfStats {
    /// Frames measured.
    pub frames: u64,
    /// Mean cost in milliseconds.
    pub mean_ms: f64,
    /// Highest cost in milliseconds.
    pub max_ms: f64,
}

impl PerfStats {
    /// Fold one frame's cost into the running figures.
    #[allow(clippy::cast_precision_loss)]
    pub fn record(&mut self, cost: Duration) {
        let ms = cost.as_secs_f64() * 1000.0;
        self.frames += 1;
        self.mean_ms += (ms - self.mean_ms) / self.frames as f64;
        if ms > self.max_ms {
            self.max_ms = ms;
        }
    }

    /// Whether either figure is over its ceiling.
    #[must_use]
    pub fn exceeds(&self, limits: &PerfLimits) -> bool {
        self.mean_ms > limits.max_mean_ms || self.max_ms > limits.max_frame_ms
    }

    /// Log an advisory if this is a reporting frame.
    ///
    /// Returns whether a warning was emitted.
    pub fn report(&self, limits: &PerfLimits) -> bool {
        if limits.report_every == 0
            || self.frames == 0
            || self.frames % u64::from(limits.report_every) != 0
        {
            return false;
        }
        debug!(
            frames = self.frames,
            mean_ms = self.mean_ms,
            max_ms = self.max_ms,
            "Capture performance"
        );
        if self.exceeds(limits) {
            warn!(
                frames = self.frames,
                mean_ms = self.mean_ms,
                max_ms = self.max_ms,
                max_mean_ms = limits.max_mean_ms,
                max_frame_ms = limits.max_frame_ms,
                "Capture is slower than the configured ceiling"
            );
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean_and_max() {
        let mut stats = PerfStats::default();
        stats.record(Duration::from_millis(2));
        stats.record(Duration::from_millis(4));
        stats.record(Duration::from_millis(6));

        assert_eq!(stats.frames, 3);
        assert!((stats.mean_ms - 4.0).abs() < 1e-9);
        assert!((stats.max_ms - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_only_on_interval() {
        crate::logging::init_test_logging();
        let limits = PerfLimits {
            report_every: 2,
            max_mean_ms: 1.0,
            max_frame_ms: 100.0,
        };
        let mut stats = PerfStats::default();

        stats.record(Duration::from_millis(5));
        assert!(!stats.report(&limits));
        stats.record(Duration::from_millis(5));
        assert!(stats.report(&limits));
    }

    #[test]
    fn test_report_within_limits() {
        let mut stats = PerfStats::default();
        for _ in 0..1000 {
            stats.record(Duration::from_micros(100));
        }
        assert!(!stats.exceeds(&PerfLimits::default()));
        assert!(!stats.report(&PerfLimits::default()));
    }

    #[test]
    fn test_report_disabled() {
        let mut stats = PerfStats::default();
        stats.record(Duration::from_secs(1));
        let limits = PerfLimits {
            report_every: 0,
            ..PerfLimits::default()
        };
        assert!(!stats.report(&limits));
    }
}
