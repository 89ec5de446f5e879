//! Engine: the fixed-period sampling loop driving the whole pipeline.
//!
//! One logical thread of control polls the sensor every tick, feeds the
//! envelope tracker, asks the onset detector for a verdict, and on each
//! onset updates the tempo estimate and renders an effect. The minute
//! aggregator is ticked every iteration. Effect renders block the loop
//! by design; pacing resynchronizes the tick deadline afterwards instead
//! of trying to catch up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::aggregate::{MinuteAggregator, SummarySink};
use crate::analysis::{EnvelopeTracker, OnsetDetector, TempoEstimator};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::effects::{Effect, EffectDispatcher, PixelStrip, Rgb};
use crate::error::{log_engine_error, EngineError};
use crate::sensor::EnvelopeSensor;

/// Capacity of the engine event bus; lagging subscribers drop events
const EVENT_BUS_CAPACITY: usize = 1024;

/// Telemetry event emitted by the sampling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Milliseconds since the loop started
    pub timestamp_ms: u64,
    pub kind: EngineEventKind,
}

/// Types of events published on the engine bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEventKind {
    Started,
    Onset {
        level: f32,
        effect: Effect,
        color: Rgb,
    },
    BpmUpdated {
        bpm: f64,
    },
    MinuteSummary {
        bpm: f64,
    },
    Stopped,
}

/// The sampling loop and everything it owns.
///
/// Correctness never depends on event delivery: the broadcast bus is
/// observational, and only the strip and the sink are real outputs.
pub struct Engine {
    config: EngineConfig,
    tracker: EnvelopeTracker,
    detector: OnsetDetector,
    tempo: TempoEstimator,
    dispatcher: EffectDispatcher,
    aggregator: MinuteAggregator,
    sensor: Box<dyn EnvelopeSensor>,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl Engine {
    /// Assemble the pipeline around validated configuration.
    pub fn new(
        config: EngineConfig,
        sensor: Box<dyn EnvelopeSensor>,
        strip: Box<dyn PixelStrip>,
        sink: Box<dyn SummarySink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let tracker = EnvelopeTracker::new(&config.detector);
        let detector = OnsetDetector::new(&config.detector);
        let tempo = TempoEstimator::new(&config.tempo);
        let dispatcher = EffectDispatcher::new(&config.effects, strip, Arc::clone(&clock));
        let aggregator = MinuteAggregator::new(&config.aggregate, sink);
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);

        Ok(Self {
            config,
            tracker,
            detector,
            tempo,
            dispatcher,
            aggregator,
            sensor,
            clock,
            running: Arc::new(AtomicBool::new(true)),
            event_tx,
        })
    }

    /// Seed the effect selection RNG for a reproducible light show.
    pub fn with_effect_seed(mut self, seed: u64) -> Self {
        self.dispatcher.reseed(seed);
        self
    }

    /// Subscribe to the engine event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Shared stop flag; storing `false` ends the loop at the next tick.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run the sampling loop until stop, sensor exhaustion, or a fatal
    /// transport error.
    pub fn run(&mut self) -> Result<(), EngineError> {
        let start = self.clock.now();
        let tick = Duration::from_millis(self.config.sampler.tick_ms);
        let offset = self.config.sampler.offset;

        log::info!(
            "[Engine] sampling loop started ({} ms tick)",
            self.config.sampler.tick_ms
        );
        self.publish(start, start, EngineEventKind::Started);

        let mut deadline = start + tick;
        let result = loop {
            if !self.running.load(Ordering::SeqCst) {
                log::info!("[Engine] stop requested");
                break Ok(());
            }

            let raw = match self.sensor.poll() {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    log::info!("[Engine] sensor exhausted, stopping");
                    break Ok(());
                }
                Err(err) => {
                    log_engine_error(&err, "sensor poll");
                    break Err(err);
                }
            };

            let level = normalize(raw, offset);
            let (short, long) = self.tracker.observe(level);
            let now = self.clock.now();

            let mut estimate = None;
            if let Some(onset) = self.detector.evaluate(short, long, now) {
                // Timestamp and tempo accounting happen before the
                // blocking render
                estimate = self.tempo.on_onset(&onset);

                let (effect, color) = match self.dispatcher.on_onset(&onset) {
                    Ok(choice) => choice,
                    Err(err) => {
                        log_engine_error(&err, "effect render");
                        break Err(err);
                    }
                };

                self.publish(
                    start,
                    onset.at,
                    EngineEventKind::Onset {
                        level: onset.level,
                        effect,
                        color,
                    },
                );
                if let Some(estimate) = estimate {
                    log::info!("[Engine] tempo {:.1} BPM", estimate.bpm);
                    self.publish(start, onset.at, EngineEventKind::BpmUpdated { bpm: estimate.bpm });
                }
            }

            if let Some(summary) = self.aggregator.tick(self.clock.now(), estimate) {
                let at = self.clock.now();
                self.publish(start, at, EngineEventKind::MinuteSummary { bpm: summary.bpm });
            }

            // Deadline pacing: sleep out the remainder of a quiet tick,
            // resynchronize after an overrun (blocking render)
            let now = self.clock.now();
            if now < deadline {
                self.clock.sleep(deadline - now);
                deadline += tick;
            } else {
                deadline = now + tick;
            }
        };

        self.running.store(false, Ordering::SeqCst);
        let end = self.clock.now();
        self.publish(start, end, EngineEventKind::Stopped);
        log::info!("[Engine] sampling loop stopped");
        result
    }

    fn publish(&self, start: Instant, at: Instant, kind: EngineEventKind) {
        let timestamp_ms = at.saturating_duration_since(start).as_millis() as u64;
        let _ = self.event_tx.send(EngineEvent { timestamp_ms, kind });
    }
}

/// Map a native 0-65535 reading onto the 0-255 envelope scale,
/// clamping everything at or below the noise offset to zero.
pub(crate) fn normalize(raw: u16, offset: u16) -> f32 {
    let level = raw >> 8;
    if level > offset {
        level as f32
    } else {
        0.0
    }
}

/// Runs an [Engine] on a dedicated thread.
pub struct EngineHandle {
    running: Arc<AtomicBool>,
    event_tx: broadcast::Sender<EngineEvent>,
    thread: Option<JoinHandle<Result<(), EngineError>>>,
}

impl EngineHandle {
    /// Move the engine onto its own thread and start the loop.
    pub fn spawn(mut engine: Engine) -> Self {
        let running = engine.running_flag();
        let event_tx = engine.event_tx.clone();
        let thread = std::thread::spawn(move || engine.run());

        Self {
            running,
            event_tx,
            thread: Some(thread),
        }
    }

    /// Subscribe to the engine event bus.
    ///
    /// Subscribers attached after events were published only see what
    /// comes later; subscribe before spawning when the first events
    /// matter.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Ask the loop to stop at its next tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for the loop to finish and surface its result.
    pub fn join(mut self) -> Result<(), EngineError> {
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                Err(EngineError::SensorFailed {
                    reason: "engine thread panicked".to_string(),
                })
            }),
            None => Ok(()),
        }
    }
}
