pub mod calibration;
pub mod error;
pub mod frame;
pub mod report;
pub mod rule;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use calibration::{
    CalibrationConfig, DEFAULT_ERROR_THRESHOLD, DEFAULT_SCALE_CANDIDATES, DEFAULT_TOP_HYPOTHESES,
    Evaluation, Hypothesis, Prediction, ReferencePolicy, RuleEvaluation, ScaleFit, ScaleSource,
    Verdict, evaluate,
};
pub use error::{CalibrationError, CalibrationResult, InsufficientReason};
pub use frame::Frame;
pub use report::{render, render_measurements, render_no_conclusion};
pub use rule::{ExtractionRule, RuleFamily, RuleRegistry};

// We use `Box<str>` and `Box<[T]>` for values that never grow after load.
type BoxStr = Box<str>;
type BoxList<T> = Box<[T]>;

/// One measurement as supplied by the caller, before its frame is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Externally measured value (e.g. PSI from a gauge).
    pub ground_truth: f64,
    /// Which physical sensor sent the frame, e.g. its radio address.
    pub source_id: String,
    /// Human-readable description.
    pub label: String,
    /// Space-separated hex bytes.
    pub raw_frame: String,
}

/// A captured frame paired with its known ground-truth value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub ground_truth: f64,
    /// Display only; never used by the evaluator.
    pub source_id: BoxStr,
    pub label: BoxStr,
    pub frame: Frame,
}

/// An ordered set of measurements whose frames all share one length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    measurements: BoxList<Measurement>,
    frame_len: usize,
}

impl Batch {
    /// Parses every record in order. The first frame fixes the batch's frame length.
    ///
    /// Frame errors come back wrapped in [`CalibrationError::Record`] with the
    /// record's index and label; use [`CalibrationError::root`] to get the
    /// underlying `MalformedFrame`, `EmptyFrame` or `FrameLengthMismatch`.
    pub fn from_records<I>(records: I) -> CalibrationResult<Self>
    where
        I: IntoIterator<Item = MeasurementRecord>,
    {
        let mut measurements = Vec::new();
        let mut frame_len = None;

        for (index, record) in records.into_iter().enumerate() {
            let frame = match frame_len {
                None => Frame::parse(&record.raw_frame),
                Some(expected) => Frame::parse_expecting(&record.raw_frame, index, expected),
            }
            .map_err(|source| CalibrationError::Record {
                index,
                label: record.label.clone(),
                source: Box::new(source),
            })?;

            frame_len.get_or_insert(frame.len());
            measurements.push(Measurement {
                ground_truth: record.ground_truth,
                source_id: record.source_id.into(),
                label: record.label.into(),
                frame,
            });
        }

        let Some(frame_len) = frame_len else {
            return Err(CalibrationError::InsufficientMeasurements(
                InsufficientReason::TooFew { count: 0 },
            ));
        };

        debug!(count = measurements.len(), frame_len, "Loaded measurement batch");

        Ok(Self {
            measurements: measurements.into_boxed_slice(),
            frame_len,
        })
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Distinct source ids in first-seen order.
    pub fn source_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for m in self.measurements.iter() {
            if !ids.contains(&&*m.source_id) {
                ids.push(&m.source_id);
            }
        }
        ids
    }
}
