use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tpms_calibrate::{BatchFile, Config, Overrides};
use tpms_core::{
    CalibrationError, ExtractionRule, ReferencePolicy, RuleFamily, Verdict, evaluate, render,
};

fn shipped_batch() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("batches/type2.toml")
}

fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn shipped_batch_analyzes() -> color_eyre::Result<()> {
    let batch = BatchFile::load(&shipped_batch())?.into_batch()?;
    let calibration = Config::default().calibration(&Overrides::default());
    let evaluation = evaluate(&batch, &calibration)?;

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.frame_len(), 11);

    let b1 = evaluation
        .rule(ExtractionRule::Byte { offset: 1 })
        .expect("b[1] is enumerated for 11-byte frames");
    assert_eq!(&*b1.raw_values, &[28, 31, 28]);
    assert!(b1.verdict.is_discriminating());

    let report = render(&batch, &evaluation);
    assert!(report.contains("MEASUREMENTS (3 frames, 11 bytes each)"));
    assert!(report.contains("NEXT STEPS"));

    Ok(())
}

#[test]
fn shipped_config_matches_defaults() -> color_eyre::Result<()> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tpms-calibrate.toml");
    let config = Config::load(&path)?;

    assert_eq!(
        config.calibration(&Overrides::default()),
        Config::default().calibration(&Overrides::default())
    );
    Ok(())
}

#[test]
fn config_file_selects_reference_and_families() -> color_eyre::Result<()> {
    let file = temp_file(
        r#"
        [calibration]
        error_threshold = 2.5

        [calibration.reference]
        type = "pair"
        first = 0
        second = 2

        [rules]
        families = ["byte"]
        "#,
    );

    let config = Config::load(file.path())?;
    let calibration = config.calibration(&Overrides::default());

    assert_eq!(calibration.error_threshold, 2.5);
    assert_eq!(
        calibration.reference,
        ReferencePolicy::Pair {
            first: 0,
            second: 2
        }
    );
    assert_eq!(calibration.registry.families(), &[RuleFamily::Byte]);
    // unspecified keys keep their defaults
    assert_eq!(calibration.scale_candidates.len(), 10);

    let batch = BatchFile::load(&shipped_batch())?.into_batch()?;
    let evaluation = evaluate(&batch, &calibration)?;
    assert_eq!(evaluation.rules.len(), 11);
    assert_eq!(
        evaluation
            .rule(ExtractionRule::Byte { offset: 1 })
            .map(|r| r.verdict),
        Some(Verdict::NonDiscriminating)
    );

    Ok(())
}

#[test]
fn mixed_frame_lengths_abort_the_batch() {
    let file = temp_file(
        r#"
        [[measurement]]
        ground_truth = 0.0
        source_id = "a"
        label = "eleven"
        raw_frame = "02 1C 18 00 92 6A D7 00 02 39 37"

        [[measurement]]
        ground_truth = 20.0
        source_id = "b"
        label = "nine"
        raw_frame = "01 1F 17 01 53 13 AA 00 01"
        "#,
    );

    let err = BatchFile::load(file.path())
        .unwrap()
        .into_batch()
        .unwrap_err();

    assert_eq!(
        err.root(),
        &CalibrationError::FrameLengthMismatch {
            index: 1,
            expected: 11,
            actual: 9
        }
    );
    assert!(!err.is_no_conclusion());
}

#[test]
fn single_measurement_is_no_conclusion() -> color_eyre::Result<()> {
    let file = temp_file(
        r#"
        [[measurement]]
        ground_truth = 0.0
        source_id = "37:39:02:00:d7:6a"
        label = "0 PSI"
        raw_frame = "02 1C 18 00"
        "#,
    );

    let batch = BatchFile::load(file.path())?.into_batch()?;
    let err = evaluate(&batch, &Config::default().calibration(&Overrides::default()))
        .unwrap_err();

    assert!(err.is_no_conclusion());
    Ok(())
}

#[test]
fn missing_batch_file_is_an_error() {
    let err = BatchFile::load(&PathBuf::from("/nonexistent/batch.toml")).unwrap_err();
    assert!(err.to_string().contains("failed to read batch"));
}
