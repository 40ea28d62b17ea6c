//! Plain-text rendering of batches and evaluations.
//!
//! Output depends only on its inputs, so two renders of the same evaluation
//! are byte-identical.

use core::fmt::{self, Display, Formatter};

use crate::calibration::{Evaluation, RuleEvaluation, Verdict};
use crate::error::CalibrationError;
use crate::{Batch, Measurement};

const SEPARATOR: &str =
    "======================================================================";

/// Per-measurement dump: label, source, ground truth, hex and decimal bytes.
pub fn render_measurements(batch: &Batch) -> String {
    MeasurementDump(batch).to_string()
}

/// Full report: measurement dump, per-rule analysis, ranked hypotheses, next steps.
pub fn render(batch: &Batch, evaluation: &Evaluation) -> String {
    Report { batch, evaluation }.to_string()
}

/// Measurement dump followed by the reason no calibration was attempted.
pub fn render_no_conclusion(batch: &Batch, error: &CalibrationError) -> String {
    NoConclusion { batch, error }.to_string()
}

fn heading(f: &mut Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{SEPARATOR}")?;
    writeln!(f, "{title}")?;
    writeln!(f, "{SEPARATOR}")
}

struct MeasurementDump<'a>(&'a Batch);

impl Display for MeasurementDump<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        heading(
            f,
            &format!(
                "MEASUREMENTS ({} frames, {} bytes each)",
                self.0.len(),
                self.0.frame_len()
            ),
        )?;

        for (index, m) in self.0.measurements().iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "#{index} {}:", m.label)?;
            writeln!(f, "  Source: {}", m.source_id)?;
            writeln!(f, "  Ground truth: {}", m.ground_truth)?;
            writeln!(f, "  Hex: {}", m.frame)?;
            writeln!(f, "  Dec: {:?}", m.frame.as_bytes())?;
        }
        Ok(())
    }
}

struct Report<'a> {
    batch: &'a Batch,
    evaluation: &'a Evaluation,
}

impl Report<'_> {
    fn rule_block(&self, f: &mut Formatter<'_>, rule: &RuleEvaluation) -> fmt::Result {
        let measurements = self.batch.measurements();

        writeln!(f)?;
        writeln!(f, "{}:", rule.rule)?;
        for (m, raw) in measurements.iter().zip(rule.raw_values.iter()) {
            writeln!(f, "  {}: {raw}", m.label)?;
        }

        let (first, second) = self.evaluation.reference;
        let (delta, truth_delta, implied_scale) = match rule.verdict {
            Verdict::NonDiscriminating => {
                return writeln!(
                    f,
                    "  non-discriminating: raw value constant across #{first} and #{second}"
                );
            }
            Verdict::Discriminating {
                delta,
                truth_delta,
                implied_scale,
            } => (delta, truth_delta, implied_scale),
        };

        match implied_scale {
            Some(ratio) => writeln!(
                f,
                "  delta raw: {delta}, delta truth: {truth_delta}, ratio: {ratio:.4}"
            )?,
            None => writeln!(
                f,
                "  delta raw: {delta}, delta truth: {truth_delta}, ratio: undefined"
            )?,
        }

        let accepted: Vec<_> = rule.accepted().collect();
        if accepted.is_empty() {
            writeln!(
                f,
                "  no scale under error threshold {} ({} tested)",
                self.evaluation.error_threshold,
                rule.fits.len()
            )?;
            return Ok(());
        }

        writeln!(
            f,
            "  scales under error threshold {}:",
            self.evaluation.error_threshold
        )?;
        for fit in accepted {
            write!(f, "    scale={} ({}):", fit.scale, fit.source)?;
            for (i, p) in fit.predictions.iter().enumerate() {
                let sep = if i == 0 { " " } else { ", " };
                write!(f, "{sep}{:.2} (err={:.2})", p.predicted, p.error)?;
            }
            writeln!(f, "; total={:.2}", fit.total_error)?;
        }
        writeln!(
            f,
            "  rejected: {} of {} scales",
            rule.rejected_count(),
            rule.fits.len()
        )
    }

    fn hypotheses(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let ranked = self.evaluation.ranked();
        let shown = ranked.len().min(self.evaluation.top_hypotheses);

        heading(
            f,
            &format!(
                "HYPOTHESES (best {shown} of {}, ranked by total error)",
                ranked.len()
            ),
        )?;
        writeln!(f)?;

        if ranked.is_empty() {
            return writeln!(
                f,
                "  no rule/scale pair fits under error threshold {}",
                self.evaluation.error_threshold
            );
        }

        for (rank, hypothesis) in ranked.iter().take(shown).enumerate() {
            writeln!(
                f,
                "  {}. {} scale={} ({}) total error={:.2}",
                rank + 1,
                hypothesis.rule,
                hypothesis.fit.scale,
                hypothesis.fit.source,
                hypothesis.fit.total_error
            )?;
        }
        Ok(())
    }

    fn next_steps(&self, f: &mut Formatter<'_>) -> fmt::Result {
        heading(f, "NEXT STEPS")?;
        writeln!(f)?;
        writeln!(
            f,
            "{} of {} rules change across the reference pair.",
            self.evaluation.discriminating_count(),
            self.evaluation.rules.len()
        )?;
        writeln!(f)?;
        writeln!(f, "If no hypothesis above holds, the field may:")?;
        writeln!(f, "- be encoded with another offset or scale")?;
        writeln!(f, "- share its bytes with a checksum or flags")?;
        writeln!(f, "- move depending on sensor status")?;
        writeln!(f)?;
        writeln!(
            f,
            "Capture another measurement at a different value from the SAME sensor to confirm the pattern."
        )?;

        let sources = self.batch.source_ids();
        if sources.len() > 1 {
            writeln!(
                f,
                "This batch mixes {} sensors ({}); per-sensor bytes can mimic a changing field.",
                sources.len(),
                sources.join(", ")
            )?;
        }
        Ok(())
    }
}

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        MeasurementDump(self.batch).fmt(f)?;

        let (first, second) = self.evaluation.reference;
        let measurements = self.batch.measurements();
        heading(
            f,
            &format!(
                "BYTE COMBINATIONS (reference {} vs {})",
                reference_label(measurements, first),
                reference_label(measurements, second)
            ),
        )?;

        for rule in self.evaluation.rules.iter() {
            self.rule_block(f, rule)?;
        }

        self.hypotheses(f)?;
        self.next_steps(f)
    }
}

/// `#i "label"`, or just `#i` when the index is not in the batch.
fn reference_label(measurements: &[Measurement], index: usize) -> String {
    match measurements.get(index) {
        Some(m) => format!("#{index} {:?}", &*m.label),
        None => format!("#{index}"),
    }
}

struct NoConclusion<'a> {
    batch: &'a Batch,
    error: &'a CalibrationError,
}

impl Display for NoConclusion<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        MeasurementDump(self.batch).fmt(f)?;
        heading(f, "NO CONCLUSION")?;
        writeln!(f)?;
        writeln!(f, "{}", self.error)?;
        writeln!(
            f,
            "Add a measurement with a different ground-truth value and run again."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CalibrationConfig, MeasurementRecord, ReferencePolicy, evaluate};

    fn type2() -> Batch {
        let records = [
            (0.0, "37:39:02:00:d7:6a", "0 PSI (Sensor 2)", "02 1C 18 00 92 6A D7 00 02 39 37"),
            (20.0, "37:39:01:00:aa:13", "20 PSI (Sensor 1)", "01 1F 17 01 53 13 AA 00 01 39 37"),
            (30.0, "37:39:02:00:d7:6a", "30 PSI (Sensor 2)", "01 1C 17 01 B3 6A D7 00 02 39 37"),
        ];
        Batch::from_records(records.map(|(psi, source, label, frame)| MeasurementRecord {
            ground_truth: psi,
            source_id: source.into(),
            label: label.into(),
            raw_frame: frame.into(),
        }))
        .unwrap()
    }

    #[test]
    fn measurement_dump_shows_hex_and_decimal() {
        let dump = render_measurements(&type2());

        assert!(dump.contains("#0 0 PSI (Sensor 2):"));
        assert!(dump.contains("  Source: 37:39:02:00:d7:6a"));
        assert!(dump.contains("  Ground truth: 20"));
        assert!(dump.contains("  Hex: 02 1C 18 00 92 6A D7 00 02 39 37"));
        assert!(dump.contains("  Dec: [2, 28, 24, 0, 146, 106, 215, 0, 2, 57, 55]"));
    }

    #[test]
    fn report_surfaces_each_verdict() {
        let batch = type2();
        let evaluation = evaluate(&batch, &CalibrationConfig::default()).unwrap();
        let report = render(&batch, &evaluation);

        assert!(report.contains("\nb[1]:\n  0 PSI (Sensor 2): 28\n  20 PSI (Sensor 1): 31\n"));
        assert!(report.contains("  delta raw: 3, delta truth: 20, ratio: 0.1500\n"));
        assert!(report.contains(
            "\nb[9]:\n  0 PSI (Sensor 2): 57\n  20 PSI (Sensor 1): 57\n  30 PSI (Sensor 2): 57\n  non-discriminating"
        ));
        assert!(report.contains("HYPOTHESES"));
        assert!(report.contains("This batch mixes 2 sensors"));
    }

    #[test]
    fn rules_appear_in_registry_order() {
        let batch = type2();
        let evaluation = evaluate(&batch, &CalibrationConfig::default()).unwrap();
        let report = render(&batch, &evaluation);

        let positions: Vec<usize> = evaluation
            .rules
            .iter()
            .map(|rule| report.find(&format!("\n{}:\n", rule.rule)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn render_is_deterministic() {
        let batch = type2();
        let config = CalibrationConfig::default();

        let a = render(&batch, &evaluate(&batch, &config).unwrap());
        let b = render(&batch, &evaluate(&batch, &config).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn shared_reference_truth_reports_undefined_ratio() {
        let batch = Batch::from_records(
            [(20.0, "10"), (20.0, "14"), (40.0, "28")].map(|(psi, frame)| MeasurementRecord {
                ground_truth: psi,
                source_id: "37:39:02:00:d7:6a".into(),
                label: format!("{psi} PSI"),
                raw_frame: frame.into(),
            }),
        )
        .unwrap();
        let config = CalibrationConfig {
            scale_candidates: vec![2.0],
            ..Default::default()
        };
        let report = render(&batch, &evaluate(&batch, &config).unwrap());

        assert!(report.contains("  delta raw: 4, delta truth: 0, ratio: undefined\n"));
        assert!(report.contains("  no scale under error threshold 5 (1 tested)\n"));
    }

    #[test]
    fn reference_outside_batch_prints_index_only() {
        let batch = type2();
        let config = CalibrationConfig {
            reference: ReferencePolicy::Pair {
                first: 0,
                second: 2,
            },
            ..Default::default()
        };
        let evaluation = evaluate(&batch, &config).unwrap();

        let shorter = Batch::from_records(
            [(0.0, "02 1C 18 00 92 6A D7 00 02 39 37"), (20.0, "01 1F 17 01 53 13 AA 00 01 39 37")]
                .map(|(psi, frame)| MeasurementRecord {
                    ground_truth: psi,
                    source_id: "37:39:02:00:d7:6a".into(),
                    label: format!("{psi} PSI"),
                    raw_frame: frame.into(),
                }),
        )
        .unwrap();
        let report = render(&shorter, &evaluation);

        assert!(report.contains("BYTE COMBINATIONS (reference #0 \"0 PSI\" vs #2)"));
    }

    #[test]
    fn no_conclusion_keeps_the_dump() {
        let batch = Batch::from_records([MeasurementRecord {
            ground_truth: 0.0,
            source_id: "37:39:02:00:d7:6a".into(),
            label: "0 PSI (Sensor 2)".into(),
            raw_frame: "02 1C".into(),
        }])
        .unwrap();
        let err = evaluate(&batch, &CalibrationConfig::default()).unwrap_err();
        let text = render_no_conclusion(&batch, &err);

        assert!(text.contains("Hex: 02 1C"));
        assert!(text.contains("NO CONCLUSION"));
        assert!(text.contains("need at least 2 measurements, got 1"));
    }
}
