use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CalibrationError, CalibrationResult, InsufficientReason};
use crate::rule::{ExtractionRule, RuleRegistry};
use crate::{Batch, BoxList, Measurement};

/// Round-number scales tried for every discriminating rule, in this order.
pub const DEFAULT_SCALE_CANDIDATES: [f64; 10] =
    [0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 0.01, 0.05, 0.072];

/// Fits whose summed error is below this are shown in the report.
pub const DEFAULT_ERROR_THRESHOLD: f64 = 5.0;

/// Number of ranked hypotheses listed in the report summary.
pub const DEFAULT_TOP_HYPOTHESES: usize = 10;

/// Which two measurements anchor the delta computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReferencePolicy {
    /// The first two measurements, in input order.
    #[default]
    FirstTwo,
    /// Two explicit zero-based measurement indices.
    Pair { first: usize, second: usize },
}

impl ReferencePolicy {
    /// Resolves the policy against a batch of `count` measurements.
    pub fn resolve(&self, count: usize) -> CalibrationResult<(usize, usize)> {
        let (first, second) = match *self {
            ReferencePolicy::FirstTwo => (0, 1),
            ReferencePolicy::Pair { first, second } => (first, second),
        };

        if first >= count || second >= count || first == second {
            return Err(CalibrationError::InvalidReference {
                first,
                second,
                count,
            });
        }

        Ok((first, second))
    }
}

/// Tunables for one evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConfig {
    pub scale_candidates: Vec<f64>,
    pub error_threshold: f64,
    pub reference: ReferencePolicy,
    pub registry: RuleRegistry,
    pub top_hypotheses: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            scale_candidates: DEFAULT_SCALE_CANDIDATES.to_vec(),
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            reference: ReferencePolicy::default(),
            registry: RuleRegistry::default(),
            top_hypotheses: DEFAULT_TOP_HYPOTHESES,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> CalibrationResult<()> {
        if let Some(&value) = self
            .scale_candidates
            .iter()
            .find(|scale| !scale.is_finite() || **scale <= 0.0)
        {
            return Err(CalibrationError::InvalidScaleCandidate { value });
        }

        if !self.error_threshold.is_finite() || self.error_threshold <= 0.0 {
            return Err(CalibrationError::InvalidThreshold {
                value: self.error_threshold,
            });
        }

        Ok(())
    }
}

/// Where a tested scale came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleSource {
    /// Raw delta over ground-truth delta of the reference pair.
    Implied,
    /// Reciprocal of the implied scale, i.e. ground truth per raw count.
    InverseImplied,
    /// Taken from the configured candidate list.
    Candidate,
}

impl core::fmt::Display for ScaleSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ScaleSource::Implied => "implied",
            ScaleSource::InverseImplied => "inverse implied",
            ScaleSource::Candidate => "candidate",
        })
    }
}

/// Predicted physical value for one measurement under one scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub predicted: f64,
    /// `|predicted - ground_truth|`
    pub error: f64,
}

/// One scale tested against every measurement of the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleFit {
    pub source: ScaleSource,
    pub scale: f64,
    /// One entry per measurement, in batch order.
    pub predictions: BoxList<Prediction>,
    pub total_error: f64,
    /// `total_error` is under the configured threshold. Display only.
    pub accepted: bool,
}

impl ScaleFit {
    fn compute(
        source: ScaleSource,
        scale: f64,
        raw_values: &[u32],
        measurements: &[Measurement],
        error_threshold: f64,
    ) -> Self {
        let predictions: BoxList<Prediction> = raw_values
            .iter()
            .zip(measurements)
            .map(|(raw, m)| {
                let predicted = f64::from(*raw) * scale;
                Prediction {
                    predicted,
                    error: (predicted - m.ground_truth).abs(),
                }
            })
            .collect();

        // left-to-right so the sum is reproducible
        let total_error = predictions.iter().fold(0.0, |acc, p| acc + p.error);

        Self {
            source,
            scale,
            predictions,
            total_error,
            accepted: total_error < error_threshold,
        }
    }
}

/// Outcome of comparing a rule's raw values across the reference pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "kebab-case")]
pub enum Verdict {
    /// The raw value is identical for both references; no scale is tried.
    NonDiscriminating,
    Discriminating {
        /// `raw[second] - raw[first]`
        delta: i64,
        /// `ground_truth[second] - ground_truth[first]`
        truth_delta: f64,
        /// `delta / truth_delta`; `None` when both references share a ground truth.
        implied_scale: Option<f64>,
    },
}

impl Verdict {
    pub fn is_discriminating(&self) -> bool {
        matches!(self, Verdict::Discriminating { .. })
    }
}

/// Everything computed for a single extraction rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleEvaluation {
    pub rule: ExtractionRule,
    /// One raw value per measurement, in batch order.
    pub raw_values: BoxList<u32>,
    pub verdict: Verdict,
    /// Implied scales first (when defined), then the candidates in configured order.
    pub fits: BoxList<ScaleFit>,
}

impl RuleEvaluation {
    pub fn accepted(&self) -> impl Iterator<Item = &ScaleFit> {
        self.fits.iter().filter(|fit| fit.accepted)
    }

    pub fn rejected_count(&self) -> usize {
        self.fits.iter().filter(|fit| !fit.accepted).count()
    }

    /// Fit for a given scale value, regardless of where it came from.
    pub fn fit_for(&self, scale: f64) -> Option<&ScaleFit> {
        self.fits.iter().find(|fit| fit.scale == scale)
    }
}

/// An accepted (rule, scale) pairing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hypothesis<'a> {
    pub rule: ExtractionRule,
    pub fit: &'a ScaleFit,
}

/// Result of running every rule of the registry over one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Indices of the reference pair.
    pub reference: (usize, usize),
    pub scale_candidates: BoxList<f64>,
    pub error_threshold: f64,
    pub top_hypotheses: usize,
    /// In registry order.
    pub rules: BoxList<RuleEvaluation>,
}

impl Evaluation {
    pub fn rule(&self, rule: ExtractionRule) -> Option<&RuleEvaluation> {
        self.rules.iter().find(|evaluation| evaluation.rule == rule)
    }

    /// Accepted fits across all rules, best first.
    ///
    /// Ties keep registry order, then fit order.
    pub fn ranked(&self) -> Vec<Hypothesis<'_>> {
        let mut hypotheses: Vec<Hypothesis<'_>> = self
            .rules
            .iter()
            .flat_map(|evaluation| {
                evaluation.accepted().map(move |fit| Hypothesis {
                    rule: evaluation.rule,
                    fit,
                })
            })
            .collect();

        hypotheses.sort_by_key(|hypothesis| OrderedFloat(hypothesis.fit.total_error));
        hypotheses
    }

    pub fn discriminating_count(&self) -> usize {
        self.rules
            .iter()
            .filter(|evaluation| evaluation.verdict.is_discriminating())
            .count()
    }
}

/// Runs every rule of `config.registry` over `batch`.
pub fn evaluate(batch: &Batch, config: &CalibrationConfig) -> CalibrationResult<Evaluation> {
    config.validate()?;

    let measurements = batch.measurements();
    if measurements.len() < 2 {
        return Err(CalibrationError::InsufficientMeasurements(
            InsufficientReason::TooFew {
                count: measurements.len(),
            },
        ));
    }

    let baseline = measurements[0].ground_truth;
    if measurements.iter().all(|m| m.ground_truth == baseline) {
        return Err(CalibrationError::InsufficientMeasurements(
            InsufficientReason::IdenticalGroundTruth,
        ));
    }

    let reference = config.reference.resolve(measurements.len())?;

    let rules: BoxList<RuleEvaluation> = config
        .registry
        .rules(batch.frame_len())
        .into_iter()
        .filter_map(|rule| evaluate_rule(rule, measurements, reference, config))
        .collect();

    debug!(
        rules = rules.len(),
        reference = ?reference,
        threshold = config.error_threshold,
        "Evaluated batch"
    );

    Ok(Evaluation {
        reference,
        scale_candidates: config.scale_candidates.iter().copied().collect(),
        error_threshold: config.error_threshold,
        top_hypotheses: config.top_hypotheses,
        rules,
    })
}

fn evaluate_rule(
    rule: ExtractionRule,
    measurements: &[Measurement],
    (first, second): (usize, usize),
    config: &CalibrationConfig,
) -> Option<RuleEvaluation> {
    let raw_values = measurements
        .iter()
        .map(|m| rule.apply(m.frame.as_bytes()))
        .collect::<Option<BoxList<u32>>>()?;

    let delta = i64::from(raw_values[second]) - i64::from(raw_values[first]);
    if delta == 0 {
        debug!(%rule, "Rule is non-discriminating");
        return Some(RuleEvaluation {
            rule,
            raw_values,
            verdict: Verdict::NonDiscriminating,
            fits: Box::new([]),
        });
    }

    let truth_delta = measurements[second].ground_truth - measurements[first].ground_truth;
    let implied_scale = (truth_delta != 0.0).then(|| delta as f64 / truth_delta);

    let mut scales = Vec::with_capacity(config.scale_candidates.len() + 2);
    if let Some(implied) = implied_scale.filter(|s| s.is_finite() && *s != 0.0) {
        scales.push((ScaleSource::Implied, implied));
        scales.push((ScaleSource::InverseImplied, truth_delta / delta as f64));
    }
    scales.extend(
        config
            .scale_candidates
            .iter()
            .map(|scale| (ScaleSource::Candidate, *scale)),
    );

    let fits: BoxList<ScaleFit> = scales
        .into_iter()
        .map(|(source, scale)| {
            ScaleFit::compute(
                source,
                scale,
                &raw_values,
                measurements,
                config.error_threshold,
            )
        })
        .collect();

    debug!(
        %rule,
        delta,
        truth_delta,
        accepted = fits.iter().filter(|fit| fit.accepted).count(),
        "Rule is discriminating"
    );

    Some(RuleEvaluation {
        rule,
        raw_values,
        verdict: Verdict::Discriminating {
            delta,
            truth_delta,
            implied_scale,
        },
        fits,
    })
}
