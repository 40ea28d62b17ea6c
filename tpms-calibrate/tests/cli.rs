use std::process::{Command, Output};

fn analyze_shipped_batch() -> Output {
    Command::new(env!("CARGO_BIN_EXE_tpms-calibrate"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("RUST_LOG")
        .args(["analyze", "batches/type2.toml"])
        .output()
        .expect("tpms-calibrate should start")
}

#[test]
fn analyze_stderr_is_byte_identical_across_runs() {
    let first = analyze_shipped_batch();
    let second = analyze_shipped_batch();

    assert!(first.status.success());
    assert!(second.status.success());
    assert_eq!(first.stderr, second.stderr);
}

#[test]
fn analyze_stderr_starts_with_the_report() {
    let output = analyze_shipped_batch();
    let stderr = String::from_utf8(output.stderr).unwrap();

    assert!(stderr.starts_with("\n======"));
    assert!(stderr.contains("MEASUREMENTS (3 frames, 11 bytes each)"));
    assert!(!stderr.contains("INFO"));
}

#[test]
fn rules_lists_the_catalogue_on_stdout() {
    let output = Command::new(env!("CARGO_BIN_EXE_tpms-calibrate"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("RUST_LOG")
        .args(["rules", "--frame-len", "3", "--family", "byte"])
        .output()
        .expect("tpms-calibrate should start");

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "b[0]\nb[1]\nb[2]\n");
}
