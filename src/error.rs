//! Error handling for Mixdeck
//!
//! Continuous controls clamp silently; everything in here is a genuine
//! failure the caller can inspect by kind.

use thiserror::Error;

/// Result type alias for Mixdeck operations
pub type Result<T> = std::result::Result<T, MixError>;

/// Main error type for Mixdeck operations
#[derive(Error, Debug)]
pub enum MixError {
    // Load Errors
    #[error("Could not decode audio: {reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Parameter Errors
    #[error("Invalid value for {param}: {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // State Errors
    #[error("Cannot {operation}: {reason}")]
    State { operation: String, reason: String },

    // Capture Errors
    #[error("Capture overrun: {dropped_frames} frames dropped at frame {at_frame}")]
    CaptureOverrun { at_frame: u64, dropped_frames: u64 },

    #[error("Command queue full, dropped {command}")]
    CommandQueueFull { command: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MixError {
    /// Shorthand for a decode failure without an underlying source
    pub fn decode(reason: impl Into<String>) -> Self {
        MixError::Decode {
            reason: reason.into(),
            source: None,
        }
    }

    /// Shorthand for a state error
    pub fn state(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        MixError::State {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a parameter error
    pub fn invalid_parameter(
        param: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        MixError::InvalidParameter {
            param: param.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MixError::Decode { .. } => "DECODE_ERROR",
            MixError::InvalidParameter { .. } => "INVALID_PARAMETER",
            MixError::State { .. } => "STATE_ERROR",
            MixError::CaptureOverrun { .. } => "CAPTURE_OVERRUN",
            MixError::CommandQueueFull { .. } => "COMMAND_QUEUE_FULL",
            MixError::Io(_) => "IO_ERROR",
            MixError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the engine fully usable: a failed load keeps
    /// the previous track, an overrun keeps recording.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MixError::Decode { .. } => true,
            MixError::InvalidParameter { .. } => true,
            MixError::State { .. } => true,
            MixError::CaptureOverrun { .. } => true,
            MixError::CommandQueueFull { .. } => true,
            MixError::Io(_) | MixError::Serialization(_) => false,
        }
    }
}

/// Reject NaN and infinities before a continuous control is clamped
pub(crate) fn ensure_finite(param: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MixError::invalid_parameter(param, value, "a finite number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = MixError::decode("empty input");
        assert_eq!(err.error_code(), "DECODE_ERROR");

        let err = MixError::state("stop recording", "not recording");
        assert_eq!(err.error_code(), "STATE_ERROR");
    }

    #[test]
    fn test_display_messages() {
        let err = MixError::CaptureOverrun {
            at_frame: 4800,
            dropped_frames: 256,
        };
        assert_eq!(
            err.to_string(),
            "Capture overrun: 256 frames dropped at frame 4800"
        );

        let err = MixError::invalid_parameter("pitch", f64::NAN, "a finite number");
        assert_eq!(
            err.to_string(),
            "Invalid value for pitch: NaN (expected a finite number)"
        );
    }

    #[test]
    fn test_recoverability() {
        assert!(MixError::decode("bad header").is_recoverable());
        assert!(MixError::CaptureOverrun {
            at_frame: 0,
            dropped_frames: 1
        }
        .is_recoverable());
        assert!(!MixError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")).is_recoverable());
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ensure_finite("gain", 0.5).unwrap(), 0.5);
        assert!(ensure_finite("gain", f64::INFINITY).is_err());
        assert!(ensure_finite("gain", f64::NEG_INFINITY).is_err());
        assert!(matches!(
            ensure_finite("gain", f64::NAN),
            Err(MixError::InvalidParameter { .. })
        ));
    }
}
