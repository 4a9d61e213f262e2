//! Temperature history thresholds.
//!
//! A sample is worth recording when it is the first one, when it moved at
//! least `delta` away from the last recorded sample, or when `interval`
//! has passed since then.  Everything else is dropped.

use std::time::{Duration, Instant};

use crate::config::SystemConfig;

#[derive(Debug, Clone)]
pub struct TemperatureRecorder {
    delta: f32,
    interval: Duration,
    last: Option<(f32, Instant)>,
}

impl TemperatureRecorder {
    pub fn new(delta: f32, interval: Duration) -> Self {
        Self {
            delta: delta.abs(),
            interval,
            last: None,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(
            config.temperature_log_delta_c,
            Duration::from_millis(u64::from(config.temperature_log_interval_ms)),
        )
    }

    /// Whether `celsius`, sampled at `at`, should be recorded.  A recorded
    /// sample becomes the new reference.
    pub fn admit(&mut self, celsius: f32, at: Instant) -> bool {
        let record = match self.last {
            None => true,
            Some((t, when)) => {
                (celsius - t).abs() >= self.delta
                    || at.saturating_duration_since(when) >= self.interval
            }
        };
        if record {
            self.last = Some((celsius, at));
        }
        record
    }
}
