// Effects module - onset-driven light rendering
//
// Every detected beat picks one effect and one color at random and
// renders it on the pixel strip. Flash and pulse hold the sampling
// thread for their full duration (50-250 ms); that latency is part of
// the look, the loop resynchronizes its tick deadline afterwards.

pub mod color;
pub mod strip;

pub use color::{random_palette_color, random_rainbow_color, Rgb, PALETTE};
pub use strip::{ConsoleStrip, PixelStrip, RecordingStrip};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::onset::OnsetEvent;
use crate::clock::Clock;
use crate::config::EffectsConfig;
use crate::error::EngineError;

/// The three onset-triggered light effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Solid color, brief hold, then dark
    Flash,
    /// Ten-step brightness ramp up and back down
    Pulse,
    /// One synthesized color, left lit until the next effect
    Rainbow,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Flash => write!(f, "flash"),
            Effect::Pulse => write!(f, "pulse"),
            Effect::Rainbow => write!(f, "rainbow"),
        }
    }
}

/// Picks and renders one effect per onset
///
/// Sole writer of the pixel strip. Selection is uniform over the three
/// effects; flash and pulse color uniformly over the palette, rainbow
/// draws its color directly. The generator is reseedable so offline
/// runs replay the exact same light show.
pub struct EffectDispatcher {
    flash_hold: Duration,
    pulse_steps: u32,
    pulse_step_hold: Duration,
    rng: StdRng,
    strip: Box<dyn PixelStrip>,
    clock: Arc<dyn Clock>,
}

impl EffectDispatcher {
    pub fn new(config: &EffectsConfig, strip: Box<dyn PixelStrip>, clock: Arc<dyn Clock>) -> Self {
        Self {
            flash_hold: Duration::from_millis(config.flash_hold_ms),
            pulse_steps: config.pulse_steps,
            pulse_step_hold: Duration::from_millis(config.pulse_step_ms),
            rng: StdRng::from_entropy(),
            strip,
            clock,
        }
    }

    /// Replace the selection RNG with a seeded one for deterministic runs
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// React to one onset: pick an effect and a color, render them
    ///
    /// Returns the choice so the engine can log and publish it. Strip
    /// failures propagate; actuator transport errors are fatal to the
    /// run loop.
    pub fn on_onset(&mut self, event: &OnsetEvent) -> Result<(Effect, Rgb), EngineError> {
        let effect = match self.rng.gen_range(0..3u8) {
            0 => Effect::Flash,
            1 => Effect::Pulse,
            _ => Effect::Rainbow,
        };
        let color = match effect {
            Effect::Rainbow => random_rainbow_color(&mut self.rng),
            _ => random_palette_color(&mut self.rng),
        };

        log::info!(
            "[Effects] onset level={:.1}: {} {}",
            event.level,
            effect,
            color
        );

        self.render(effect, color)?;
        Ok((effect, color))
    }

    /// Render a specific effect/color pair on the strip
    pub fn render(&mut self, effect: Effect, color: Rgb) -> Result<(), EngineError> {
        match effect {
            Effect::Flash => self.render_flash(color),
            Effect::Pulse => self.render_pulse(color),
            Effect::Rainbow => self.render_rainbow(color),
        }
    }

    fn render_flash(&mut self, color: Rgb) -> Result<(), EngineError> {
        self.strip.fill(color)?;
        self.strip.show()?;
        self.clock.sleep(self.flash_hold);
        self.strip.fill(Rgb::OFF)?;
        self.strip.show()?;
        Ok(())
    }

    fn render_pulse(&mut self, color: Rgb) -> Result<(), EngineError> {
        // Triangle ramp 0 -> 1 -> 0; the last step lands back on black
        let span = self.pulse_steps.saturating_sub(1).max(1) as f32;
        for step in 0..self.pulse_steps {
            let phase = step as f32 / span;
            let intensity = 1.0 - (2.0 * phase - 1.0).abs();
            self.strip.fill(color.scaled(intensity))?;
            self.strip.show()?;
            self.clock.sleep(self.pulse_step_hold);
        }
        Ok(())
    }

    fn render_rainbow(&mut self, color: Rgb) -> Result<(), EngineError> {
        self.strip.fill(color)?;
        self.strip.show()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Mutex;
    use std::time::Instant;

    fn dispatcher_with_recorder(
        seed: u64,
    ) -> (EffectDispatcher, Arc<Mutex<Vec<Rgb>>>, Arc<ManualClock>) {
        let strip = RecordingStrip::new();
        let frames = strip.frames_ref();
        let clock = Arc::new(ManualClock::new());
        let mut dispatcher = EffectDispatcher::new(
            &EffectsConfig::default(),
            Box::new(strip),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        dispatcher.reseed(seed);
        (dispatcher, frames, clock)
    }

    fn onset() -> OnsetEvent {
        OnsetEvent {
            at: Instant::now(),
            level: 150.0,
        }
    }

    #[test]
    fn test_flash_commits_color_then_dark() {
        let (mut dispatcher, frames, clock) = dispatcher_with_recorder(1);
        let red = Rgb::new(255, 0, 0);

        dispatcher.render(Effect::Flash, red).unwrap();

        assert_eq!(*frames.lock().unwrap(), vec![red, Rgb::OFF]);
        assert_eq!(clock.elapsed(), Duration::from_millis(50));
    }

    #[test]
    fn test_pulse_ramps_up_and_back_to_dark() {
        let (mut dispatcher, frames, clock) = dispatcher_with_recorder(1);
        let white = Rgb::new(255, 255, 255);

        dispatcher.render(Effect::Pulse, white).unwrap();

        let committed = frames.lock().unwrap();
        assert_eq!(committed.len(), 10);
        assert_eq!(committed[0], Rgb::OFF, "Pulse must start dark");
        assert_eq!(committed[9], Rgb::OFF, "Pulse must end dark");

        // Brightness peaks mid-ramp
        let peak = committed.iter().map(|c| c.r).max().unwrap();
        assert!(peak > 200, "Pulse never reached full brightness: {}", peak);
        assert!(committed[4].r > committed[1].r);

        // Ten steps at 20 ms each
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn test_rainbow_commits_single_frame() {
        let (mut dispatcher, frames, clock) = dispatcher_with_recorder(1);
        let color = Rgb::new(17, 200, 238);

        dispatcher.render(Effect::Rainbow, color).unwrap();

        assert_eq!(*frames.lock().unwrap(), vec![color]);
        assert_eq!(clock.elapsed(), Duration::ZERO, "Rainbow has no animation");
    }

    #[test]
    fn test_on_onset_is_deterministic_per_seed() {
        let (mut first, first_frames, _) = dispatcher_with_recorder(42);
        let (mut second, second_frames, _) = dispatcher_with_recorder(42);

        for _ in 0..10 {
            first.on_onset(&onset()).unwrap();
            second.on_onset(&onset()).unwrap();
        }

        assert_eq!(*first_frames.lock().unwrap(), *second_frames.lock().unwrap());
    }

    #[test]
    fn test_on_onset_reaches_every_effect() {
        let (mut dispatcher, _, _) = dispatcher_with_recorder(7);
        let mut seen_flash = false;
        let mut seen_pulse = false;
        let mut seen_rainbow = false;

        for _ in 0..100 {
            let (effect, _) = dispatcher.on_onset(&onset()).unwrap();
            match effect {
                Effect::Flash => seen_flash = true,
                Effect::Pulse => seen_pulse = true,
                Effect::Rainbow => seen_rainbow = true,
            }
        }

        assert!(
            seen_flash && seen_pulse && seen_rainbow,
            "Effect selection missed a variant: flash={} pulse={} rainbow={}",
            seen_flash,
            seen_pulse,
            seen_rainbow
        );
    }

    #[test]
    fn test_rainbow_color_is_off_palette_draw() {
        let (mut dispatcher, frames, _) = dispatcher_with_recorder(3);

        for _ in 0..50 {
            dispatcher.on_onset(&onset()).unwrap();
        }

        // Rainbow frames satisfy b = 255 - r with a bright green channel
        // and lie outside the fixed palette; flash/pulse frames cannot
        // fake all three at once
        let committed = frames.lock().unwrap();
        let rainbow_seen = committed
            .iter()
            .any(|c| c.b == 255 - c.r && c.g >= 128 && !PALETTE.contains(c));
        assert!(rainbow_seen, "No rainbow color was ever committed");
    }
}
