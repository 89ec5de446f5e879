// Color primitives for the pixel strip
//
// The palette mirrors the nine display colors the effects cycle
// through. Selection is uniform over the whole palette; the rainbow
// effect instead synthesizes a color from independent channel draws.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One RGB triple, 0-255 per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Fixed display palette for flash and pulse effects
pub const PALETTE: [Rgb; 9] = [
    Rgb::new(255, 0, 0),
    Rgb::new(255, 128, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(0, 255, 255),
    Rgb::new(0, 128, 255),
    Rgb::new(128, 0, 255),
    Rgb::new(255, 0, 255),
    Rgb::new(255, 255, 255),
];

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale each channel by an intensity in `[0.0, 1.0]`
    ///
    /// Out-of-range intensities are clamped; channel values truncate
    /// toward zero so an intensity of 0.0 always yields black.
    pub fn scaled(self, intensity: f32) -> Rgb {
        let intensity = intensity.clamp(0.0, 1.0);
        Rgb {
            r: (self.r as f32 * intensity) as u8,
            g: (self.g as f32 * intensity) as u8,
            b: (self.b as f32 * intensity) as u8,
        }
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Draw one palette color uniformly at random
pub fn random_palette_color<R: Rng>(rng: &mut R) -> Rgb {
    PALETTE[rng.gen_range(0..PALETTE.len())]
}

/// Synthesize a rainbow color from independent channel draws
///
/// Red is uniform over the full range, green stays in the bright upper
/// half, and blue complements red so the result never collapses to
/// black or white.
pub fn random_rainbow_color<R: Rng>(rng: &mut R) -> Rgb {
    let r = rng.gen::<u8>();
    let g = rng.gen_range(128u8..=255);
    let b = 255 - r;
    Rgb { r, g, b }
}
