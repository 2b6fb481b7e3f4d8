//! Error handling for the EEG cleaning engine
//!
//! Every fallible engine operation returns [`EngineResult`]. Variants carry
//! enough context for the interactive layer to explain the failure without
//! inspecting engine state.

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Error type for all cleaning, segment and evaluation operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Filter cutoffs or notch parameters are outside `(0, nyquist)` or non-increasing
    #[error("invalid filter spec: {reason}")]
    InvalidFilterSpec {
        reason: String,
    },

    /// Too few samples for the requested filter order
    #[error("insufficient samples: {actual} available, more than {required} required (max usable order {max_order})")]
    InsufficientSamples {
        required: usize,
        actual: usize,
        /// Highest order that would fit the available samples, 0 if none
        max_order: usize,
    },

    /// Input rejected before any processing ran
    #[error("malformed input: {reason}")]
    MalformedInput {
        reason: String,
    },

    /// Revert/re-apply range is empty after clamping to the recording
    #[error("segment [{start}, {end}) is outside recording of {duration:.3}s")]
    OutOfRangeSegment {
        start: f64,
        end: f64,
        duration: f64,
    },

    /// Component separation did not produce a usable decomposition
    #[error("decomposition failure: {reason}")]
    DecompositionFailure {
        reason: String,
    },

    /// A stage produced non-finite output from finite input
    #[error("numerical instability in {stage}")]
    NumericalInstability {
        stage: &'static str,
    },

    /// Revert, re-apply or evaluate called before any successful pipeline run
    #[error("no active pipeline result")]
    NoActiveSession,

    /// Configuration could not be parsed or failed validation
    #[error("configuration error: {reason}")]
    Config {
        reason: String,
    },

    /// Persisted file has an unexpected layout
    #[error("format error: {reason}")]
    Format {
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True for errors that the pipeline recovers from with a degraded result
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::DecompositionFailure { .. })
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::Format {
            reason: err.to_string(),
        }
    }
}

/// Convenience macro for creating malformed-input errors
#[macro_export]
macro_rules! malformed_input {
    ($($arg:tt)+) => {
        $crate::error::EngineError::MalformedInput {
            reason: format!($($arg)+),
        }
    };
}

/// Convenience macro for creating filter-spec errors
#[macro_export]
macro_rules! invalid_spec {
    ($($arg:tt)+) => {
        $crate::error::EngineError::InvalidFilterSpec {
            reason: format!($($arg)+),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EngineError::InsufficientSamples {
            required: 99,
            actual: 40,
            max_order: 2,
        };
        let display = format!("{}", error);
        assert!(display.contains("insufficient samples"));
        assert!(display.contains("99"));
        assert!(display.contains("40"));
    }

    #[test]
    fn test_macros_format_reason() {
        let err = malformed_input!("rank {} not supported", 3);
        assert!(matches!(err, EngineError::MalformedInput { ref reason } if reason == "rank 3 not supported"));

        let err = invalid_spec!("low {} >= high {}", 40.0, 1.0);
        assert!(err.to_string().starts_with("invalid filter spec"));
    }

    #[test]
    fn test_only_decomposition_is_recoverable() {
        assert!(EngineError::DecompositionFailure { reason: "rank".into() }.is_recoverable());
        assert!(!EngineError::NoActiveSession.is_recoverable());
        assert!(!EngineError::OutOfRangeSegment { start: 5.0, end: 5.0, duration: 4.0 }.is_recoverable());
    }
}
