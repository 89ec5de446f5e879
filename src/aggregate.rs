// Minute aggregation - periodic tempo summaries
//
// Smoothed BPM estimates pile up in a buffer for one wall-clock minute;
// at the boundary their mean goes to the sink as a single line and the
// buffer starts over. A failed append is logged and the data dropped,
// because retrying would smear the minute boundary.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::analysis::tempo::BpmEstimate;
use crate::config::AggregateConfig;

/// Mean tempo over one aggregation window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinuteSummary {
    pub bpm: f64,
}

impl MinuteSummary {
    /// The sink line format: fixed-point with one fractional digit
    pub fn to_line(self) -> String {
        format!("{:.1}\n", self.bpm)
    }
}

/// Append-only destination for minute summaries
pub trait SummarySink: Send {
    fn append(&mut self, summary: &MinuteSummary) -> std::io::Result<()>;
}

/// Appends one line per summary to a text log
///
/// The file is opened fresh for every flush; a flush happens at most
/// once a minute, so holding the handle open buys nothing and an
/// unplugged disk only costs the one summary.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SummarySink for FileSink {
    fn append(&mut self, summary: &MinuteSummary) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.write_all(summary.to_line().as_bytes())
    }
}

/// In-memory sink for tests and offline runs
pub struct MemorySink {
    summaries: Arc<Mutex<Vec<MinuteSummary>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            summaries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the recorded summaries
    pub fn summaries_ref(&self) -> Arc<Mutex<Vec<MinuteSummary>>> {
        Arc::clone(&self.summaries)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl SummarySink for MemorySink {
    fn append(&mut self, summary: &MinuteSummary) -> std::io::Result<()> {
        self.summaries
            .lock()
            .map_err(|_| std::io::Error::other("summary recorder lock poisoned"))?
            .push(*summary);
        Ok(())
    }
}

/// Sink that rejects every append, for failure-path tests
pub struct FailingSink;

impl SummarySink for FailingSink {
    fn append(&mut self, _summary: &MinuteSummary) -> std::io::Result<()> {
        Err(std::io::Error::other("sink unavailable"))
    }
}

/// Buffers BPM estimates and flushes their mean once per minute
pub struct MinuteAggregator {
    flush_interval: Duration,
    buffer: Vec<f64>,
    window_start: Option<Instant>,
    sink: Box<dyn SummarySink>,
}

impl MinuteAggregator {
    pub fn new(config: &AggregateConfig, sink: Box<dyn SummarySink>) -> Self {
        Self {
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            buffer: Vec::new(),
            window_start: None,
            sink,
        }
    }

    /// Absorb this tick's estimate, flushing at the window boundary
    ///
    /// The window clock starts on the first tick and resets on every
    /// boundary crossing, whether or not anything was flushed. The
    /// returned summary reflects what was computed even when the sink
    /// rejected it; the write failure is logged and the buffer dropped
    /// either way.
    pub fn tick(&mut self, now: Instant, estimate: Option<BpmEstimate>) -> Option<MinuteSummary> {
        let window_start = *self.window_start.get_or_insert(now);

        if let Some(estimate) = estimate {
            self.buffer.push(estimate.bpm);
        }

        if now.saturating_duration_since(window_start) < self.flush_interval {
            return None;
        }
        self.window_start = Some(now);

        if self.buffer.is_empty() {
            return None;
        }

        let mean = self.buffer.iter().sum::<f64>() / self.buffer.len() as f64;
        self.buffer.clear();
        let summary = MinuteSummary { bpm: mean };

        match self.sink.append(&summary) {
            Ok(()) => log::info!("[Aggregate] minute mean {:.1} BPM", summary.bpm),
            Err(err) => log::error!(
                "[Aggregate] failed to append summary ({:.1} BPM): {}",
                summary.bpm,
                err
            ),
        }

        Some(summary)
    }

    /// Number of estimates waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
