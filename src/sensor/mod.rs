// Sensor module - envelope sources feeding the sampling loop
//
// The loop polls one raw level per tick from whatever source it was
// given: the live microphone, a WAV recording, or a deterministic
// synthetic pattern. All of them speak the native 0-65535 range; the
// engine normalizes at its own boundary.

pub mod mic;
pub mod synthetic;
pub mod wav;

pub use mic::MicSensor;
pub use synthetic::SyntheticSensor;
pub use wav::WavSensor;

use crate::error::EngineError;

/// A polled scalar-magnitude source
///
/// `poll` is called once per sampler tick. `Ok(None)` means the source
/// is exhausted and the loop should wind down cleanly; transport
/// failures surface as errors and stop the run.
pub trait EnvelopeSensor: Send {
    fn poll(&mut self) -> Result<Option<u16>, EngineError>;
}
