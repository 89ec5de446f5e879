// TempoEstimator - smoothed BPM from inter-onset intervals
//
// Every onset is measured against the previous one. Intervals outside
// the plausible range are discarded (double-triggers and long silences
// would otherwise wreck the average), but the previous-onset anchor
// still advances so measurement stays onset-to-onset. Plausible
// intervals become instantaneous BPM values smoothed over a bounded
// FIFO of recent beats.

use std::collections::VecDeque;
use std::time::Instant;

use crate::analysis::onset::OnsetEvent;
use crate::config::TempoConfig;

/// Smoothed tempo estimate in beats per minute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmEstimate {
    pub bpm: f64,
}

/// Turns a stream of onsets into a rolling tempo estimate
pub struct TempoEstimator {
    min_interval_ms: u64,
    max_interval_ms: u64,
    history: VecDeque<f64>,
    capacity: usize,
    previous_onset: Option<Instant>,
}

impl TempoEstimator {
    pub fn new(config: &TempoConfig) -> Self {
        let capacity = config.smoothing_samples.max(1);
        Self {
            min_interval_ms: config.min_interval_ms,
            max_interval_ms: config.max_interval_ms,
            history: VecDeque::with_capacity(capacity + 1),
            capacity,
            previous_onset: None,
        }
    }

    /// Absorb one onset, returning the refreshed estimate when the
    /// interval since the previous onset was plausible
    ///
    /// The previous-onset anchor advances on every call, including the
    /// first onset (which has nothing to measure against) and onsets
    /// whose interval falls outside the accepted range.
    pub fn on_onset(&mut self, event: &OnsetEvent) -> Option<BpmEstimate> {
        let previous = self.previous_onset.replace(event.at)?;

        let interval_ms = event.at.saturating_duration_since(previous).as_millis() as u64;
        if interval_ms <= self.min_interval_ms || interval_ms >= self.max_interval_ms {
            return None;
        }

        let instantaneous = 60_000.0 / interval_ms as f64;
        self.history.push_back(instantaneous);
        if self.history.len() > self.capacity {
            self.history.pop_front();
        }

        let mean = self.history.iter().sum::<f64>() / self.history.len() as f64;
        Some(BpmEstimate { bpm: mean })
    }

    /// Number of instantaneous BPM samples currently smoothed over
    pub fn sample_count(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn onset_at(at: Instant) -> OnsetEvent {
        OnsetEvent { at, level: 100.0 }
    }

    fn estimator() -> TempoEstimator {
        TempoEstimator::new(&TempoConfig::default())
    }

    #[test]
    fn test_first_onset_primes_without_estimate() {
        let mut estimator = estimator();
        let start = Instant::now();

        assert!(estimator.on_onset(&onset_at(start)).is_none());
        assert_eq!(estimator.sample_count(), 0);

        // The first onset still anchored interval measurement
        let estimate = estimator.on_onset(&onset_at(start + Duration::from_millis(500)));
        assert_eq!(estimate, Some(BpmEstimate { bpm: 120.0 }));
    }

    #[test]
    fn test_500ms_interval_is_120_bpm() {
        let mut estimator = estimator();
        let start = Instant::now();

        estimator.on_onset(&onset_at(start));
        let estimate = estimator
            .on_onset(&onset_at(start + Duration::from_millis(500)))
            .expect("500 ms interval should produce an estimate");

        assert_eq!(estimate.bpm, 120.0);
    }

    #[test]
    fn test_implausible_interval_still_advances_anchor() {
        let mut estimator = estimator();
        let start = Instant::now();

        estimator.on_onset(&onset_at(start));

        // 2500 ms is outside the accepted range: no estimate
        let rejected = estimator.on_onset(&onset_at(start + Duration::from_millis(2500)));
        assert!(rejected.is_none());
        assert_eq!(estimator.sample_count(), 0);

        // But the next interval is measured from the rejected onset,
        // 3000 - 2500 = 500 ms
        let estimate = estimator
            .on_onset(&onset_at(start + Duration::from_millis(3000)))
            .expect("Interval after rejected onset should count");
        assert_eq!(estimate.bpm, 120.0);
    }

    #[test]
    fn test_interval_bounds_are_strict() {
        let start = Instant::now();

        for (interval_ms, accepted) in [(300, false), (301, true), (1999, true), (2000, false)] {
            let mut estimator = estimator();
            estimator.on_onset(&onset_at(start));
            let estimate =
                estimator.on_onset(&onset_at(start + Duration::from_millis(interval_ms)));
            assert_eq!(
                estimate.is_some(),
                accepted,
                "Interval of {} ms handled incorrectly",
                interval_ms
            );
        }
    }

    #[test]
    fn test_smoothing_over_bounded_history() {
        let mut estimator = estimator();
        let start = Instant::now();

        // Seven onsets at a steady 500 ms produce six valid intervals;
        // the FIFO holds at most five samples
        let mut last_estimate = None;
        for beat in 0..7 {
            let at = start + Duration::from_millis(beat * 500);
            if let Some(estimate) = estimator.on_onset(&onset_at(at)) {
                last_estimate = Some(estimate);
            }
        }

        assert_eq!(last_estimate, Some(BpmEstimate { bpm: 120.0 }));
        assert_eq!(estimator.sample_count(), 5);
    }

    #[test]
    fn test_estimate_is_mean_of_recent_beats() {
        let mut estimator = estimator();
        let start = Instant::now();

        estimator.on_onset(&onset_at(start));

        // 500 ms -> 120 BPM
        let first = estimator
            .on_onset(&onset_at(start + Duration::from_millis(500)))
            .unwrap();
        assert_eq!(first.bpm, 120.0);

        // 600 ms -> 100 BPM, smoothed mean (120 + 100) / 2 = 110
        let second = estimator
            .on_onset(&onset_at(start + Duration::from_millis(1100)))
            .unwrap();
        assert_eq!(second.bpm, 110.0);
    }
}
