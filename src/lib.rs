// beatglow - real-time beat detection driving LED light effects
// Envelope statistics, adaptive onset gating, tempo smoothing, and
// onset-triggered rendering on a single cooperative sampling loop

// Module declarations
pub mod aggregate;
pub mod analysis;
pub mod clock;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod sensor;

// Re-exports for convenience
pub use aggregate::{FileSink, MemorySink, MinuteAggregator, MinuteSummary, SummarySink};
pub use analysis::{BpmEstimate, EnvelopeTracker, OnsetDetector, OnsetEvent, TempoEstimator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use effects::{ConsoleStrip, Effect, EffectDispatcher, PixelStrip, RecordingStrip, Rgb};
pub use engine::{Engine, EngineEvent, EngineEventKind, EngineHandle};
pub use error::{EngineError, ErrorCode};
pub use sensor::{EnvelopeSensor, MicSensor, SyntheticSensor, WavSensor};
