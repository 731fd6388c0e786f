use crate::error::{PqrstError, Result};
use crate::phases::PhaseInterval;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The two artifacts of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    /// Filtered trace limited to the visualization window.
    pub plot: Vec<f64>,
    pub phases: Vec<PhaseInterval>,
}

/// Number of leading samples kept for plotting: `min(len, floor(window_s * fs))`.
pub fn plot_sample_count(len: usize, fs: f64, window_s: f64) -> usize {
    let cap = window_s * fs;
    if cap.is_finite() && cap > 0.0 {
        len.min(cap as usize)
    } else {
        0
    }
}

/// Leading `window_s` seconds of `filtered`, values untouched.
pub fn trim_for_plot(filtered: &[f64], fs: f64, window_s: f64) -> Vec<f64> {
    filtered[..plot_sample_count(filtered.len(), fs, window_s)].to_vec()
}

impl Artifacts {
    pub fn new(filtered: &[f64], fs: f64, window_s: f64, phases: Vec<PhaseInterval>) -> Self {
        Self {
            plot: trim_for_plot(filtered, fs, window_s),
            phases,
        }
    }

    pub fn plot_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.plot)?)
    }

    pub fn phases_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.phases)?)
    }

    /// Write both artifacts into `dir`, returning their paths.
    pub fn write(&self, dir: &Path, record_id: &str) -> Result<ArtifactPaths> {
        let paths = ArtifactPaths::in_dir(dir, record_id);
        let plot = self.plot_json()?;
        let phases = self.phases_json()?;
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        fs::write(&paths.plot, plot).map_err(|e| io_error(&paths.plot, e))?;
        fs::write(&paths.phases, phases).map_err(|e| io_error(&paths.phases, e))?;
        debug!(
            "wrote {} and {}",
            paths.plot.display(),
            paths.phases.display()
        );
        Ok(paths)
    }
}

/// On-disk locations of the plot and phases artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub plot: PathBuf,
    pub phases: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path, record_id: &str) -> Self {
        Self {
            plot: dir.join(format!("ecg_plot{}.json", record_id)),
            phases: dir.join(format!("ecg_phases{}.json", record_id)),
        }
    }

    /// Read both artifact texts back, checking that each still parses.
    pub fn read_back(&self) -> Result<(String, String)> {
        let plot = fs::read_to_string(&self.plot).map_err(|e| io_error(&self.plot, e))?;
        let phases = fs::read_to_string(&self.phases).map_err(|e| io_error(&self.phases, e))?;
        serde_json::from_str::<Vec<f64>>(&plot)?;
        serde_json::from_str::<Vec<PhaseInterval>>(&phases)?;
        Ok((plot, phases))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> PqrstError {
    PqrstError::Serialization(format!("{}: {}", path.display(), err))
}
