use std::process::Command;

fn dicom_mask() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dicom-mask"))
}

#[test]
fn missing_arguments_print_usage_and_fail() {
    let output = dicom_mask().output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "{stderr}");
}

#[test]
fn missing_input_reports_the_error_kind() {
    let work = tempfile::tempdir().unwrap();
    let output = dicom_mask()
        .arg(work.path().join("absent"))
        .arg(work.path().join("out"))
        .arg(work.path().join("mask.dcm"))
        .arg("--quiet")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[NotFoundError]"), "{stderr}");
    assert!(!work.path().join("out").exists());
}
