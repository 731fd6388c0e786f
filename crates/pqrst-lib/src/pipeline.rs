use crate::config::PipelineConfig;
use crate::detectors::PeakDetector;
use crate::error::Result;
use crate::filter::FirBandpass;
use crate::io::wfdb::{self, RecordFiles};
use crate::landmarks::{locate_landmarks_with, BeatLandmarks};
use crate::output::Artifacts;
use crate::phases::{build_phases_with, PhaseInterval};
use crate::signal::{Events, TimeSeries};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Everything one run computes, including the intermediate stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub fs: f64,
    pub filtered: Vec<f64>,
    pub r_peaks: Events,
    pub landmarks: Vec<BeatLandmarks>,
    pub phases: Vec<PhaseInterval>,
    /// The detector failed and the run continued with no beats.
    pub peak_detection_degraded: bool,
}

impl PipelineOutput {
    /// Shape the run into its plot and phases artifacts.
    pub fn artifacts(&self, cfg: &PipelineConfig) -> Artifacts {
        Artifacts::new(&self.filtered, self.fs, cfg.plot_window_s, self.phases.clone())
    }
}

/// Filter, detect, locate and build, strictly in that order.
pub fn run_pipeline(
    ts: &TimeSeries,
    detector: &dyn PeakDetector,
    cfg: &PipelineConfig,
) -> Result<PipelineOutput> {
    ts.validate()?;
    let fir = FirBandpass::from_config(ts.fs, &cfg.filter)?;
    let filtered = TimeSeries::new(ts.fs, fir.apply(&ts.data));
    debug!("filtered {} samples with {} taps", filtered.len(), fir.len());

    let (r_peaks, peak_detection_degraded) = match detector.detect(&filtered) {
        Ok(events) => (events, false),
        Err(err) => {
            warn!(
                "peak detection ({}) failed, continuing without beats: {:#}",
                detector.name(),
                err
            );
            (Events::empty(), true)
        }
    };

    let landmarks = locate_landmarks_with(&filtered.data, &r_peaks, ts.fs, &cfg.landmarks);
    let phases = build_phases_with(&landmarks, ts.fs, cfg.pairing);
    info!(
        "{} beat(s) via {} -> {} phase interval(s)",
        r_peaks.len(),
        detector.name(),
        phases.len()
    );

    Ok(PipelineOutput {
        fs: ts.fs,
        filtered: filtered.data,
        r_peaks,
        landmarks,
        phases,
        peak_detection_degraded,
    })
}

/// Locate and load a WFDB record, then run the pipeline on its first lead.
pub fn run_record(
    files: &RecordFiles,
    detector: &dyn PeakDetector,
    cfg: &PipelineConfig,
) -> Result<PipelineOutput> {
    let ts = wfdb::load_record(files)?;
    run_pipeline(&ts, detector, cfg)
}
