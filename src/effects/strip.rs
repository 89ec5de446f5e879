//! Pixel strip implementations for hosts without LED hardware
//!
//! The engine drives whatever `PixelStrip` it is handed. On a headless
//! host that is the `ConsoleStrip`, which traces committed frames at
//! debug level; tests use the `RecordingStrip` to assert on the exact
//! frame sequence an effect produced.

use std::sync::{Arc, Mutex};

use crate::effects::color::Rgb;
use crate::error::EngineError;

/// Addressable color actuator with staged writes
///
/// `fill` stages a color for every pixel; nothing is visible until the
/// next `show` commits it. Implementations must be cheap per call since
/// pulse renders commit ten frames back to back.
pub trait PixelStrip: Send {
    fn fill(&mut self, color: Rgb) -> Result<(), EngineError>;
    fn show(&mut self) -> Result<(), EngineError>;
}

/// Headless strip that traces committed frames
pub struct ConsoleStrip {
    staged: Rgb,
}

impl ConsoleStrip {
    pub fn new() -> Self {
        Self { staged: Rgb::OFF }
    }
}

impl Default for ConsoleStrip {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelStrip for ConsoleStrip {
    fn fill(&mut self, color: Rgb) -> Result<(), EngineError> {
        self.staged = color;
        Ok(())
    }

    fn show(&mut self) -> Result<(), EngineError> {
        tracing::debug!("[Strip] show {}", self.staged);
        Ok(())
    }
}

/// Strip that records every committed frame
///
/// The frame buffer is shared out through `frames_ref` so a test can
/// keep asserting after the strip itself moved into the dispatcher.
pub struct RecordingStrip {
    staged: Rgb,
    frames: Arc<Mutex<Vec<Rgb>>>,
}

impl RecordingStrip {
    pub fn new() -> Self {
        Self {
            staged: Rgb::OFF,
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the committed frame sequence
    pub fn frames_ref(&self) -> Arc<Mutex<Vec<Rgb>>> {
        Arc::clone(&self.frames)
    }
}

impl Default for RecordingStrip {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelStrip for RecordingStrip {
    fn fill(&mut self, color: Rgb) -> Result<(), EngineError> {
        self.staged = color;
        Ok(())
    }

    fn show(&mut self) -> Result<(), EngineError> {
        let mut frames = self.frames.lock().map_err(|_| EngineError::ActuatorFailed {
            reason: "frame recorder lock poisoned".to_string(),
        })?;
        frames.push(self.staged);
        Ok(())
    }
}
