use serde::Serialize;

pub type CalibrationResult<T> = core::result::Result<T, CalibrationError>;

/// Why a batch cannot produce a calibration conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InsufficientReason {
    /// Fewer than two measurements in the batch.
    TooFew { count: usize },
    /// Every measurement carries the same ground-truth value.
    IdenticalGroundTruth,
}

impl core::fmt::Display for InsufficientReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InsufficientReason::TooFew { count } => {
                write!(f, "need at least 2 measurements, got {count}")
            }
            InsufficientReason::IdenticalGroundTruth => {
                write!(f, "all measurements share the same ground truth")
            }
        }
    }
}

/// Errors raised while loading or evaluating a measurement batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("malformed frame: token {token:?} at position {position} is not a two-digit hex byte")]
    MalformedFrame { position: usize, token: String },
    #[error("malformed frame: no bytes")]
    EmptyFrame,
    #[error("frame length mismatch: measurement {index} has {actual} bytes, batch expects {expected}")]
    FrameLengthMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("no conclusion: {0}")]
    InsufficientMeasurements(InsufficientReason),
    #[error("invalid reference pair ({first}, {second}) for a batch of {count} measurements")]
    InvalidReference {
        first: usize,
        second: usize,
        count: usize,
    },
    #[error("scale candidate {value} must be finite and positive")]
    InvalidScaleCandidate { value: f64 },
    #[error("error threshold {value} must be finite and positive")]
    InvalidThreshold { value: f64 },
    #[error("measurement {index} ({label}): {source}")]
    Record {
        index: usize,
        label: String,
        #[source]
        source: Box<CalibrationError>,
    },
}

impl CalibrationError {
    /// True for the terminal "no conclusion" outcome, as opposed to bad input.
    pub fn is_no_conclusion(&self) -> bool {
        matches!(self, CalibrationError::InsufficientMeasurements(_))
    }

    /// Strips any `Record` wrappers.
    pub fn root(&self) -> &CalibrationError {
        match self {
            CalibrationError::Record { source, .. } => source.root(),
            other => other,
        }
    }
}
