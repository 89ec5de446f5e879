// WAV replay source
//
// Decodes a recording up front (float or 16/24/32-bit int, downmixed to
// mono) and serves one envelope level per poll: the rectified mean of a
// tick-sized block of samples, scaled to the native sensor range.

use std::path::Path;

use crate::error::EngineError;
use crate::sensor::EnvelopeSensor;

/// Offline envelope source backed by a decoded WAV file
#[derive(Debug)]
pub struct WavSensor {
    samples: Vec<f32>,
    block_len: usize,
    cursor: usize,
}

impl WavSensor {
    /// Decode `path` and prepare blocks of `tick_ms` worth of audio
    pub fn open<P: AsRef<Path>>(path: P, tick_ms: u64) -> Result<Self, EngineError> {
        let (samples, sample_rate) = read_wav(path.as_ref())?;
        let block_len = ((sample_rate as u64 * tick_ms.max(1)) / 1000).max(1) as usize;
        Ok(Self {
            samples,
            block_len,
            cursor: 0,
        })
    }

    /// Ticks this recording will sustain before exhaustion
    pub fn remaining_ticks(&self) -> usize {
        (self.samples.len() - self.cursor).div_ceil(self.block_len)
    }
}

impl EnvelopeSensor for WavSensor {
    fn poll(&mut self) -> Result<Option<u16>, EngineError> {
        if self.cursor >= self.samples.len() {
            return Ok(None);
        }

        let end = (self.cursor + self.block_len).min(self.samples.len());
        let block = &self.samples[self.cursor..end];
        self.cursor = end;

        let magnitude = block.iter().map(|s| s.abs()).sum::<f32>() / block.len() as f32;
        let level = (magnitude.clamp(0.0, 1.0) * 65_535.0) as u16;
        Ok(Some(level))
    }
}

fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), EngineError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| EngineError::StreamOpenFailed {
        reason: format!("failed to open {}: {err}", path.display()),
    })?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(EngineError::StreamOpenFailed {
            reason: format!("{} has zero channels", path.display()),
        });
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| {
                sample.map_err(|err| EngineError::SensorFailed {
                    reason: format!("error reading {}: {err}", path.display()),
                })
            })
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            16 => reader
                .samples::<i16>()
                .map(|sample| {
                    sample.map(|v| v as f32 / i16::MAX as f32).map_err(|err| {
                        EngineError::SensorFailed {
                            reason: format!("error reading {}: {err}", path.display()),
                        }
                    })
                })
                .collect::<Result<Vec<f32>, _>>()?,
            24 | 32 => reader
                .samples::<i32>()
                .map(|sample| {
                    sample.map(|v| v as f32 / i32::MAX as f32).map_err(|err| {
                        EngineError::SensorFailed {
                            reason: format!("error reading {}: {err}", path.display()),
                        }
                    })
                })
                .collect::<Result<Vec<f32>, _>>()?,
            bits => {
                return Err(EngineError::StreamOpenFailed {
                    reason: format!(
                        "unsupported bits_per_sample={} for {}",
                        bits,
                        path.display()
                    ),
                })
            }
        },
    };

    if spec.channels == 1 {
        return Ok((samples, spec.sample_rate));
    }

    let mut mono = Vec::with_capacity(samples.len() / spec.channels as usize);
    for frame in samples.chunks(spec.channels as usize) {
        let sum: f32 = frame.iter().copied().sum();
        mono.push(sum / spec.channels as f32);
    }

    Ok((mono, spec.sample_rate))
}
