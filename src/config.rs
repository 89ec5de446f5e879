//! Configuration management for dynamic parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. Detection thresholds,
//! tempo plausibility bounds, sampling cadence, and effect timing can all
//! be adjusted via the config file for rapid experimentation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub detector: DetectorConfig,
    pub tempo: TempoConfig,
    pub sampler: SamplerConfig,
    pub effects: EffectsConfig,
    pub aggregate: AggregateConfig,
}

/// Onset detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Short window length in samples
    pub short_window: usize,
    /// Long window length in samples
    pub long_window: usize,
    /// Short mean must exceed long mean times this ratio
    pub threshold_ratio: f32,
    /// Short-window variance must exceed this floor
    pub variance_floor: f32,
    /// Refractory period after an onset, in milliseconds
    pub min_interval_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 50,
            // Short mean more than 15% above long mean counts as a transient
            threshold_ratio: 1.15,
            variance_floor: 50.0,
            min_interval_ms: 120,
        }
    }
}

/// Tempo estimation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoConfig {
    /// Intervals at or below this are implausible (milliseconds, exclusive)
    pub min_interval_ms: u64,
    /// Intervals at or above this are implausible (milliseconds, exclusive)
    pub max_interval_ms: u64,
    /// Depth of the instantaneous-BPM smoothing FIFO
    pub smoothing_samples: usize,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            // 300-2000 ms keeps the estimate inside 30-200 BPM
            min_interval_ms: 300,
            max_interval_ms: 2000,
            smoothing_samples: 5,
        }
    }
}

/// Sampling loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Nominal tick period in milliseconds
    pub tick_ms: u64,
    /// Normalized levels at or below this clamp to zero
    pub offset: u16,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 5,
            offset: 50,
        }
    }
}

/// Effect render timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectsConfig {
    /// Flash on-time before blanking, in milliseconds
    pub flash_hold_ms: u64,
    /// Number of steps in the pulse ramp
    pub pulse_steps: u32,
    /// Hold per pulse step, in milliseconds
    pub pulse_step_ms: u64,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            flash_hold_ms: 50,
            pulse_steps: 10,
            pulse_step_ms: 20,
        }
    }
}

/// Minute aggregation and persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Wall-clock window between summary flushes, in milliseconds
    pub flush_interval_ms: u64,
    /// Append-only summary log path
    pub log_path: PathBuf,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 60_000,
            log_path: PathBuf::from("bpm_log.txt"),
        }
    }
}

impl Default for EngineConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            tempo: TempoConfig::default(),
            sampler: SamplerConfig::default(),
            effects: EffectsConfig::default(),
            aggregate: AggregateConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file is missing or the
    /// JSON is invalid (a warning is logged in either case).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file("assets/engine_config.json")
    }

    /// Validate invariant expectations before the loop starts.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.detector.short_window == 0 {
            return Err(EngineError::ConfigInvalid {
                reason: "detector.short_window must be > 0".to_string(),
            });
        }
        if self.detector.long_window == 0 {
            return Err(EngineError::ConfigInvalid {
                reason: "detector.long_window must be > 0".to_string(),
            });
        }
        if self.detector.threshold_ratio <= 0.0 {
            return Err(EngineError::ConfigInvalid {
                reason: "detector.threshold_ratio must be positive".to_string(),
            });
        }
        if self.tempo.smoothing_samples == 0 {
            return Err(EngineError::ConfigInvalid {
                reason: "tempo.smoothing_samples must be > 0".to_string(),
            });
        }
        if self.tempo.max_interval_ms <= self.tempo.min_interval_ms {
            return Err(EngineError::ConfigInvalid {
                reason: "tempo.max_interval_ms must exceed tempo.min_interval_ms".to_string(),
            });
        }
        if self.sampler.tick_ms == 0 {
            return Err(EngineError::ConfigInvalid {
                reason: "sampler.tick_ms must be > 0".to_string(),
            });
        }
        if self.effects.pulse_steps == 0 {
            return Err(EngineError::ConfigInvalid {
                reason: "effects.pulse_steps must be > 0".to_string(),
            });
        }
        if self.aggregate.flush_interval_ms == 0 {
            return Err(EngineError::ConfigInvalid {
                reason: "aggregate.flush_interval_ms must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
