// OnsetDetector - two-window energy-ratio onset detection
//
// A beat is declared on the tick where all three gates pass:
// 1. Ratio gate: short-window mean rises strictly above the long-window
//    mean scaled by the threshold ratio
// 2. Variance gate: short-window variance strictly exceeds the floor,
//    so a slow loudness drift cannot register as a hit
// 3. Refractory gate: strictly more than the minimum interval has
//    elapsed since the previous onset, collapsing one physical hit
//    into one event even when several adjacent ticks qualify
//
// The check runs once per sampler tick, so each gate short-circuits.

use std::time::{Duration, Instant};

use crate::analysis::envelope::EnvelopeStats;
use crate::config::DetectorConfig;

/// A detected beat onset
#[derive(Debug, Clone, Copy)]
pub struct OnsetEvent {
    /// Monotonic timestamp of the tick that fired
    pub at: Instant,
    /// Short-window mean level at the moment of detection
    pub level: f32,
}

/// Compares short- and long-window statistics each tick and emits one
/// event per detected beat
///
/// The detector is stateless beyond the timestamp of the last onset,
/// which doubles as the refractory anchor.
pub struct OnsetDetector {
    threshold_ratio: f32,
    variance_floor: f32,
    min_interval: Duration,
    last_onset: Option<Instant>,
}

impl OnsetDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            threshold_ratio: config.threshold_ratio,
            variance_floor: config.variance_floor,
            min_interval: Duration::from_millis(config.min_interval_ms),
            last_onset: None,
        }
    }

    /// Evaluate one tick's window statistics
    ///
    /// # Arguments
    /// * `short` - Statistics of the short (reactive) window
    /// * `long` - Statistics of the long (ambient) window
    /// * `now` - Monotonic timestamp of this tick
    ///
    /// # Returns
    /// `Some(OnsetEvent)` when a new beat fired on this tick, `None`
    /// otherwise. An empty or silent long window (mean 0) never fires,
    /// so startup ticks cannot satisfy the ratio vacuously.
    pub fn evaluate(
        &mut self,
        short: EnvelopeStats,
        long: EnvelopeStats,
        now: Instant,
    ) -> Option<OnsetEvent> {
        if long.mean <= 0.0 {
            return None;
        }
        if short.mean <= long.mean * self.threshold_ratio {
            return None;
        }
        if short.variance <= self.variance_floor {
            return None;
        }
        if let Some(last) = self.last_onset {
            if now.saturating_duration_since(last) <= self.min_interval {
                return None;
            }
        }

        self.last_onset = Some(now);
        Some(OnsetEvent {
            at: now,
            level: short.mean,
        })
    }
}
