// src/progress.rs - Print progress as reported by the host
use std::time::Duration;

use crate::config::CooldownSettings;

/// Raw progress payload from the host printer-state API. Any field may be
/// absent while the host is still settling (print just started, estimate not
/// computed yet), so everything is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawProgress {
    /// Seconds into the print.
    pub print_time: Option<f64>,
    /// Estimated seconds remaining.
    pub print_time_left: Option<f64>,
    /// Where the estimate came from, informational only.
    pub print_time_left_origin: Option<String>,
    /// Completion percent as tracked by the gcode progress counter.
    pub completion: Option<f64>,
}

/// Validated snapshot used for threshold evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub time_elapsed: Duration,
    pub time_left: Duration,
    pub time_left_origin: Option<String>,
    /// Gcode-reported completion as a fraction in [0, 1].
    pub completion_gcode: f64,
}

impl ProgressSnapshot {
    /// Returns `None` when a required field is missing or garbage; the caller
    /// skips this round and retries on the next tick. The estimate origin is
    /// informational and may stay absent.
    pub fn from_raw(raw: RawProgress) -> Option<Self> {
        let time_elapsed = seconds(raw.print_time?)?;
        let time_left = seconds(raw.print_time_left?)?;
        let completion = raw.completion?;
        if !completion.is_finite() || completion < 0.0 {
            return None;
        }
        Some(Self {
            time_elapsed,
            time_left,
            time_left_origin: raw.print_time_left_origin,
            completion_gcode: completion / 100.0,
        })
    }

    /// Completion derived from timing: elapsed / (elapsed + left). Defined as
    /// zero while both sides are zero, which the host reports on the very
    /// first ticks of a print.
    pub fn completion_time(&self) -> f64 {
        let total = self.time_elapsed + self.time_left;
        if total.is_zero() {
            return 0.0;
        }
        self.time_elapsed.as_secs_f64() / total.as_secs_f64()
    }

    /// The completion metric selected by the settings.
    pub fn completion_for(&self, settings: &CooldownSettings) -> f64 {
        if settings.completion_use_gcode {
            self.completion_gcode
        } else {
            self.completion_time()
        }
    }
}

fn seconds(value: f64) -> Option<Duration> {
    if value.is_finite() && value >= 0.0 {
        Some(Duration::from_secs_f64(value))
    } else {
        None
    }
}
