use crate::detectors::EcgPipelineConfig;
use crate::filter::FilterConfig;
use crate::landmarks::LandmarkWindows;
use crate::phases::PhasePairing;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Visualization cap applied to the plot artifact (seconds).
pub const PLOT_WINDOW_S: f64 = 60.0;

/// Every tunable of one processing run. Missing TOML keys fall back to the
/// defaults below.
///
/// ```toml
/// plot_window_s = 60.0
/// pairing = "per-beat"
///
/// [filter]
/// low_hz = 3.0
/// high_hz = 45.0
/// taps = 101
///
/// [landmarks]
/// qs_s = 0.08
/// p_s = 0.2
/// t_s = 0.4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub filter: FilterConfig,
    pub landmarks: LandmarkWindows,
    pub pairing: PhasePairing,
    pub plot_window_s: f64,
    pub detector: EcgPipelineConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            landmarks: LandmarkWindows::default(),
            pairing: PhasePairing::PerBeat,
            plot_window_s: PLOT_WINDOW_S,
            detector: EcgPipelineConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing pipeline config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
