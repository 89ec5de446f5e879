// Analysis module - beat detection pipeline
//
// Envelope samples flow through this pipeline once per sampler tick:
// - EnvelopeTracker: sliding short/long windows with running statistics
// - OnsetDetector: window statistics in, discrete beat onsets out
// - TempoEstimator: onset intervals in, smoothed BPM estimate out
//
// All three components are plain owned structs driven by the engine
// loop; none of them touches the clock, the sensor or the actuator.

pub mod envelope;
pub mod onset;
pub mod tempo;

pub use envelope::{EnvelopeStats, EnvelopeTracker, SlidingWindow};
pub use onset::{OnsetDetector, OnsetEvent};
pub use tempo::{BpmEstimate, TempoEstimator};
