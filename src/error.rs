// Error types for the beatglow engine
//
// This module defines the custom error type for sampling-loop operations,
// providing structured error handling with stable numeric codes for
// diagnostics output.

use log::error;
use std::fmt;

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling in logs
/// and CLI diagnostics.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Engine error code constants
///
/// Single source of truth for the numeric codes emitted in logs and
/// diagnostics reports.
///
/// Error code range: 2001-2004
pub struct EngineErrorCodes {}

impl EngineErrorCodes {
    /// Sensor transport failed mid-run
    pub const SENSOR_FAILED: i32 = 2001;

    /// Failed to open the capture stream
    pub const STREAM_OPEN_FAILED: i32 = 2002;

    /// Actuator write or commit failed
    pub const ACTUATOR_FAILED: i32 = 2003;

    /// Configuration rejected by validation
    pub const CONFIG_INVALID: i32 = 2004;
}

/// Log an engine error with structured context
///
/// Logs with the numeric code so failures can be grepped out of long
/// session logs without matching on message wording.
pub fn log_engine_error(err: &EngineError, context: &str) {
    error!(
        "Engine error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors surfaced by the sampling loop and its boundaries
///
/// Plausibility rejections and startup edge cases are policy branches, not
/// errors; only transport and configuration failures appear here.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Sensor transport failed mid-run
    SensorFailed { reason: String },

    /// Failed to open the capture stream
    StreamOpenFailed { reason: String },

    /// Actuator write or commit failed
    ActuatorFailed { reason: String },

    /// Configuration rejected by validation
    ConfigInvalid { reason: String },
}

impl ErrorCode for EngineError {
    fn code(&self) -> i32 {
        match self {
            EngineError::SensorFailed { .. } => EngineErrorCodes::SENSOR_FAILED,
            EngineError::StreamOpenFailed { .. } => EngineErrorCodes::STREAM_OPEN_FAILED,
            EngineError::ActuatorFailed { .. } => EngineErrorCodes::ACTUATOR_FAILED,
            EngineError::ConfigInvalid { .. } => EngineErrorCodes::CONFIG_INVALID,
        }
    }

    fn message(&self) -> String {
        match self {
            EngineError::SensorFailed { reason } => {
                format!("Sensor failed: {}", reason)
            }
            EngineError::StreamOpenFailed { reason } => {
                format!("Failed to open capture stream: {}", reason)
            }
            EngineError::ActuatorFailed { reason } => {
                format!("Actuator failed: {}", reason)
            }
            EngineError::ConfigInvalid { reason } => {
                format!("Invalid configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::SensorFailed {
            reason: err.to_string(),
        }
    }
}
