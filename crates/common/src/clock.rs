//! Media-time utilities for timeline synchronization.
//!
//! All TileSync positions and durations are integer milliseconds. This
//! module provides utilities for:
//! - Converting between milliseconds and seconds
//! - Formatting `HH:MM:SS` labels for transport displays
//! - Measuring drift between a clip and its proportional target
//! - Rate-limiting periodic reports

/// Convert milliseconds to seconds.
pub fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / 1_000.0
}

/// Convert seconds to milliseconds, rounding to the nearest ms.
/// Negative and non-finite inputs map to 0.
pub fn secs_to_ms(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * 1_000.0).round() as u64
}

/// Format a millisecond position as `HH:MM:SS` (truncating sub-second part).
pub fn format_hms(ms: u64) -> String {
    let seconds = ms / 1_000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    format!("{:02}:{:02}:{:02}", hours, minutes % 60, seconds % 60)
}

/// Transport label in the form `current / total`.
pub fn format_transport(position_ms: u64, duration_ms: u64) -> String {
    format!("{} / {}", format_hms(position_ms), format_hms(duration_ms))
}

/// Drift measurement between a clip's expected and reported position.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Proportional target position (ms).
    pub reference_ms: u64,
    /// Position reported by the clip (ms).
    pub measured_ms: u64,
}

impl DriftMeasurement {
    /// Drift in milliseconds (positive = measured is ahead).
    pub fn drift_ms(&self) -> i64 {
        self.measured_ms as i64 - self.reference_ms as i64
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: u64) -> bool {
        self.drift_ms().unsigned_abs() > threshold_ms
    }
}

/// Rate limiter for periodic reports (progress lines, position polls).
#[derive(Debug)]
pub struct RateController {
    target_interval_ms: u64,
    last_tick_ms: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ms: 1_000 / target_hz.max(1) as u64,
            last_tick_ms: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ms: u64) -> bool {
        match self.last_tick_ms {
            None => {
                self.last_tick_ms = Some(current_ms);
                true
            }
            Some(last) if current_ms >= last + self.target_interval_ms => {
                self.last_tick_ms = Some(current_ms);
                true
            }
            _ => false,
        }
    }

    /// Target interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.target_interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_secs_conversion() {
        assert!((ms_to_secs(1_500) - 1.5).abs() < 1e-9);
        assert_eq!(secs_to_ms(2.0), 2_000);
        assert_eq!(secs_to_ms(0.0004), 0);
        assert_eq!(secs_to_ms(-3.0), 0);
        assert_eq!(secs_to_ms(f64::NAN), 0);
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(61_999), "00:01:01");
        assert_eq!(format_hms(3_723_000), "01:02:03");
        assert_eq!(format_transport(30_000, 120_000), "00:00:30 / 00:02:00");
    }

    #[test]
    fn test_drift_measurement() {
        let drift = DriftMeasurement {
            reference_ms: 10_000,
            measured_ms: 10_050,
        };
        assert_eq!(drift.drift_ms(), 50);
        assert!(drift.exceeds_threshold_ms(10));
        assert!(!drift.exceeds_threshold_ms(100));

        let behind = DriftMeasurement {
            reference_ms: 10_000,
            measured_ms: 9_000,
        };
        assert_eq!(behind.drift_ms(), -1_000);
        assert!(behind.exceeds_threshold_ms(250));
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(4);
        assert!(ctrl.should_tick(0)); // first tick always fires
        assert!(!ctrl.should_tick(100)); // too soon
        assert!(ctrl.should_tick(250));
        assert_eq!(ctrl.interval_ms(), 250);
    }
}
