// Deterministic synthetic envelope source
//
// Emits beat bursts at a fixed tempo over a quiet noise floor. Every
// level comes from a seeded generator, so a given (seed, bpm, duration)
// triple always produces the same run - the backbone of the `simulate`
// command and the integration tests.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;
use crate::sensor::EnvelopeSensor;

/// How long each simulated hit stays loud
const BURST_MS: u64 = 40;

/// Loud burst levels, native units (normalize to roughly 156-242)
const BURST_RANGE: std::ops::RangeInclusive<u16> = 40_000..=62_000;

/// Quiet floor levels, native units (all clamp to zero downstream)
const FLOOR_RANGE: std::ops::RangeInclusive<u16> = 0..=6_000;

/// Seeded pulse-train source at a configured tempo
pub struct SyntheticSensor {
    rng: StdRng,
    ticks_per_beat: u64,
    burst_ticks: u64,
    total_ticks: u64,
    ticks_emitted: u64,
}

impl SyntheticSensor {
    /// Build a pattern of `bpm` beats per minute lasting `duration`,
    /// sampled at one level per `tick_ms`
    pub fn new(bpm: u32, duration: Duration, tick_ms: u64, seed: u64) -> Self {
        let bpm = bpm.max(1) as u64;
        let tick_ms = tick_ms.max(1);
        Self {
            rng: StdRng::seed_from_u64(seed),
            ticks_per_beat: (60_000 / bpm / tick_ms).max(1),
            burst_ticks: (BURST_MS / tick_ms).max(1),
            total_ticks: duration.as_millis() as u64 / tick_ms,
            ticks_emitted: 0,
        }
    }
}

impl EnvelopeSensor for SyntheticSensor {
    fn poll(&mut self) -> Result<Option<u16>, EngineError> {
        if self.ticks_emitted >= self.total_ticks {
            return Ok(None);
        }

        let beat_phase = self.ticks_emitted % self.ticks_per_beat;
        let level = if beat_phase < self.burst_ticks {
            self.rng.gen_range(BURST_RANGE)
        } else {
            self.rng.gen_range(FLOOR_RANGE)
        };

        self.ticks_emitted += 1;
        Ok(Some(level))
    }
}
