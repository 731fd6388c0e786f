use assert_cmd::Command;
use pqrst_lib::phases::{Phase, PhaseInterval};
use pqrst_lib::signal::Events;
use std::{error::Error, fs, path::Path};
use tempfile::tempdir;

const FS: f64 = 250.0;

/// Gaussian QRS-like bumps with small P and T waves, one beat every `rr` seconds.
fn synthetic_ecg(seconds: f64, rr: f64) -> Vec<f64> {
    let samples = (seconds * FS) as usize;
    let bump = |t: f64, centre: f64, width: f64, amp: f64| {
        amp * (-0.5 * ((t - centre) / width).powi(2)).exp()
    };
    (0..samples)
        .map(|i| {
            let t = i as f64 / FS;
            let mut v = 0.0;
            let mut beat = 0.5;
            while beat < seconds {
                v += bump(t, beat - 0.16, 0.025, 0.15);
                v += bump(t, beat - 0.03, 0.008, -0.2);
                v += bump(t, beat, 0.012, 1.2);
                v += bump(t, beat + 0.03, 0.008, -0.25);
                v += bump(t, beat + 0.25, 0.04, 0.3);
                beat += rr;
            }
            v
        })
        .collect()
}

fn write_lines<T: ToString>(path: &Path, values: &[T]) -> Result<(), Box<dyn Error>> {
    let text: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    fs::write(path, text.join("\n"))?;
    Ok(())
}

fn pqrst() -> Command {
    Command::cargo_bin("pqrst").expect("pqrst binary")
}

#[test]
fn phases_from_given_peaks_come_in_beat_order() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("trace.txt");
    let peaks = dir.path().join("peaks.txt");
    write_lines(&trace, &synthetic_ecg(8.0, 0.8))?;
    let indices: Vec<usize> = vec![175, 375, 575, 775, 975, 1175, 1375];
    write_lines(&peaks, &indices)?;

    let output = pqrst()
        .args(["phases", "--fs", "250", "--input"])
        .arg(&trace)
        .arg("--rpeaks")
        .arg(&peaks)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let phases: Vec<PhaseInterval> = serde_json::from_slice(&output)?;

    // interior peaks leave every window non-empty
    assert_eq!(phases.len(), indices.len() * 3);
    for (beat, chunk) in phases.chunks(3).enumerate() {
        let labels: Vec<Phase> = chunk.iter().map(|p| p.phase).collect();
        assert_eq!(labels, vec![Phase::Pq, Phase::Qrs, Phase::St], "beat {}", beat);
        let r = indices[beat] as f64 / FS;
        assert!(chunk[1].entry <= r && r <= chunk[1].entry + chunk[1].duration + 1e-9);
    }
    assert!(phases
        .iter()
        .all(|p| p.entry.is_finite() && p.duration.is_finite() && p.duration >= 0.0));
    Ok(())
}

#[test]
fn detector_finds_beats_in_synthetic_recording() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("trace.txt");
    write_lines(&trace, &synthetic_ecg(10.0, 0.8))?;

    let output = pqrst()
        .args(["rpeaks", "--fs", "250", "--input"])
        .arg(&trace)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let events: Events = serde_json::from_slice(&output)?;
    assert!(events.indices.len() >= 8, "found {:?}", events.indices);
    assert!(events.indices.windows(2).all(|w| w[0] < w[1]));
    Ok(())
}

#[test]
fn silent_trace_gives_full_plot_and_no_phases() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("zeros.txt");
    write_lines(&trace, &vec![0.0f64; (10.0 * FS) as usize])?;

    let plot = pqrst()
        .args(["filter", "--fs", "250", "--input"])
        .arg(&trace)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let plot: Vec<f64> = serde_json::from_slice(&plot)?;
    assert_eq!(plot.len(), 2500);
    assert!(plot.iter().all(|v| v.abs() < 1e-12));

    let phases = pqrst()
        .args(["phases", "--fs", "250", "--input"])
        .arg(&trace)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let phases: Vec<PhaseInterval> = serde_json::from_slice(&phases)?;
    assert!(phases.is_empty());
    Ok(())
}

#[test]
fn plot_artifact_is_capped_at_sixty_seconds() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("long.txt");
    write_lines(&trace, &vec![0.5f64; 70 * 100])?;

    let plot = pqrst()
        .args(["filter", "--fs", "100", "--input"])
        .arg(&trace)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let plot: Vec<f64> = serde_json::from_slice(&plot)?;
    assert_eq!(plot.len(), 6000);
    Ok(())
}

#[test]
fn inverted_band_is_rejected() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("trace.txt");
    write_lines(&trace, &synthetic_ecg(2.0, 0.8))?;

    let assert = pqrst()
        .args(["filter", "--fs", "250", "--lowcut-hz", "40", "--highcut-hz", "5", "--input"])
        .arg(&trace)
        .assert()
        .failure();
    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(stdout.is_empty());
    assert!(stderr.contains("invalid filter parameters"), "{}", stderr);
    Ok(())
}

#[test]
fn config_file_and_csv_export() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("trace.txt");
    let peaks = dir.path().join("peaks.txt");
    let config = dir.path().join("pqrst.toml");
    write_lines(&trace, &synthetic_ecg(4.0, 0.8))?;
    write_lines(&peaks, &[300usize, 500])?;
    fs::write(&config, "[filter]\nlow_hz = 1.0\nhigh_hz = 40.0\ntaps = 64\n")?;

    let output = pqrst()
        .args(["phases", "--fs", "250", "--format", "csv", "--input"])
        .arg(&trace)
        .arg("--rpeaks")
        .arg(&peaks)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output)?;
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("entry,duration,phase"));
    let phases: Vec<&str> = lines.map(|l| l.rsplit(',').next().unwrap_or("")).collect();
    assert_eq!(phases, vec!["PQ", "QRS", "ST", "PQ", "QRS", "ST"]);
    Ok(())
}

#[test]
fn process_requires_the_full_triplet() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("100.hea"),
        "100 1 360 3600\n100.dat 16 200 16 0 0 0 0 MLII\n",
    )?;
    let out = dir.path().join("outputs");

    let assert = pqrst()
        .args(["process", "--record", "100", "--wfdb-dir"])
        .arg(dir.path())
        .arg("--out")
        .arg(&out)
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(stderr.contains("missing input"), "{}", stderr);
    assert!(stderr.contains("100.dat") && stderr.contains("100.atr"));
    assert!(!out.join("ecg_plot100.json").exists());
    assert!(!out.join("ecg_phases100.json").exists());
    Ok(())
}

#[test]
fn unusable_peak_file_fails_the_run() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let trace = dir.path().join("trace.txt");
    let unsorted = dir.path().join("unsorted.txt");
    write_lines(&trace, &synthetic_ecg(4.0, 0.8))?;
    write_lines(&unsorted, &[500usize, 300])?;

    for peaks in [dir.path().join("does-not-exist.txt"), unsorted] {
        let assert = pqrst()
            .args(["phases", "--fs", "250", "--input"])
            .arg(&trace)
            .arg("--rpeaks")
            .arg(&peaks)
            .assert()
            .failure();
        assert!(assert.get_output().stdout.is_empty());
    }
    Ok(())
}
