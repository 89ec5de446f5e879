// Sliding-window envelope statistics
//
// Beat detection compares loudness over two time scales: a short window
// that reacts to the current instant and a long window that tracks the
// ambient level. Both are fixed-capacity FIFOs over the same normalized
// envelope stream, refreshed every sampler tick.

use std::collections::VecDeque;

use crate::config::DetectorConfig;

/// Summary statistics for one window of envelope samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeStats {
    pub mean: f32,
    /// Population variance (divides by N, not N-1)
    pub variance: f32,
}

impl EnvelopeStats {
    pub const EMPTY: EnvelopeStats = EnvelopeStats {
        mean: 0.0,
        variance: 0.0,
    };
}

/// Fixed-capacity FIFO window over envelope samples
///
/// New samples are appended at the back; once the window is full the
/// oldest sample is evicted in O(1). The window never exceeds its
/// configured capacity.
pub struct SlidingWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SlidingWindow {
    /// Create an empty window holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one once past capacity
    pub fn push(&mut self, sample: f32) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean and population variance of the current contents
    ///
    /// An empty window reports zero for both, which downstream guards
    /// treat as "no signal yet".
    pub fn stats(&self) -> EnvelopeStats {
        if self.samples.is_empty() {
            return EnvelopeStats::EMPTY;
        }

        let len = self.samples.len() as f32;
        let mean = self.samples.iter().sum::<f32>() / len;
        let variance = self
            .samples
            .iter()
            .map(|sample| {
                let delta = sample - mean;
                delta * delta
            })
            .sum::<f32>()
            / len;

        EnvelopeStats { mean, variance }
    }
}

/// Tracks short and long windows over the same envelope stream
pub struct EnvelopeTracker {
    short: SlidingWindow,
    long: SlidingWindow,
}

impl EnvelopeTracker {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            short: SlidingWindow::new(config.short_window),
            long: SlidingWindow::new(config.long_window),
        }
    }

    /// Feed one envelope sample to both windows and report their stats
    ///
    /// Returns `(short, long)` statistics computed after the sample has
    /// been absorbed, so the newest sample always contributes.
    pub fn observe(&mut self, sample: f32) -> (EnvelopeStats, EnvelopeStats) {
        self.short.push(sample);
        self.long.push(sample);
        (self.short.stats(), self.long.stats())
    }
}
