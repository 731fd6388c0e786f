use assert_cmd::Command;
use pqrst_lib::boundary::ErrorResponse;
use std::{error::Error, fs};
use tempfile::tempdir;

#[test]
fn respond_reports_missing_parts_as_json() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("118.hea"), "118 2 360 650000\n")?;
    fs::write(dir.path().join("118.atr"), [0u8, 0u8])?;

    let assert = Command::cargo_bin("pqrst")?
        .args(["respond", "--record", "118", "--wfdb-dir"])
        .arg(dir.path())
        .assert()
        .failure();
    let response: ErrorResponse = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(response.error, "missing_input");
    assert!(response.details.contains("118.dat"));
    assert!(!response.details.contains("118.hea"));
    // the caller's directory is left as it was
    assert!(dir.path().join("118.hea").is_file());
    Ok(())
}

#[test]
fn respond_reports_unreadable_header() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("9.hea"), "9 none\n")?;
    fs::write(dir.path().join("9.dat"), [0u8; 16])?;
    fs::write(dir.path().join("9.atr"), [0u8, 0u8])?;

    let assert = Command::cargo_bin("pqrst")?
        .args(["respond", "--record", "9", "--wfdb-dir"])
        .arg(dir.path())
        .assert()
        .failure();
    let response: ErrorResponse = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(response.error, "record_format");
    assert!(response.details.contains("signal count"));
    Ok(())
}
