use super::PeakDetector;
use crate::signal::{Events, TimeSeries};
use log::debug;
use serde::{Deserialize, Serialize};

/// Configurable parameters for the adaptive-threshold R-peak detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcgPipelineConfig {
    /// Lower cutoff for the single-pole high-pass filter (Hz).
    pub lowcut_hz: f64,
    /// Upper cutoff for the single-pole low-pass filter (Hz).
    pub highcut_hz: f64,
    /// Moving window integration length (seconds).
    pub integration_window_s: f64,
    /// Minimum physiological RR distance / refractory period (seconds).
    pub min_rr_s: f64,
    /// Scale between noise and signal envelopes for the adaptive threshold.
    pub threshold_scale: f64,
    /// How far back to search (seconds) for the precise R-peak after a detection.
    pub search_back_s: f64,
}

impl Default for EcgPipelineConfig {
    fn default() -> Self {
        Self {
            lowcut_hz: 5.0,
            highcut_hz: 15.0,
            integration_window_s: 0.150,
            min_rr_s: 0.120,
            threshold_scale: 0.6,
            search_back_s: 0.150,
        }
    }
}

/// Pan–Tompkins-style envelope detector behind the [`PeakDetector`] seam.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeDetector {
    pub config: EcgPipelineConfig,
}

impl EnvelopeDetector {
    pub fn new(config: EcgPipelineConfig) -> Self {
        Self { config }
    }
}

impl PeakDetector for EnvelopeDetector {
    fn name(&self) -> &'static str {
        "envelope"
    }

    fn detect(&self, ts: &TimeSeries) -> anyhow::Result<Events> {
        if !(ts.fs.is_finite() && ts.fs > 0.0) {
            anyhow::bail!("cannot detect beats at sampling rate {}", ts.fs);
        }
        Ok(detect_r_peaks_with_config(ts, &self.config))
    }
}

/// Run the detector with a minimal configuration surface.
pub fn detect_r_peaks(ts: &TimeSeries, min_rr_s: f64) -> Events {
    let cfg = EcgPipelineConfig {
        min_rr_s: min_rr_s.max(0.15),
        ..EcgPipelineConfig::default()
    };
    detect_r_peaks_with_config(ts, &cfg)
}

/// Detect R-peaks using the configurable pipeline.
pub fn detect_r_peaks_with_config(ts: &TimeSeries, cfg: &EcgPipelineConfig) -> Events {
    if ts.is_empty() {
        return Events::empty();
    }

    let (bandpassed, integrated) = pan_tompkins_envelope(ts, cfg);
    if integrated.iter().all(|v| *v <= f64::EPSILON) {
        debug!("flat envelope, no beats to detect");
        return Events::empty();
    }
    let peaks = pick_peaks(&bandpassed, &integrated, ts.fs, cfg);

    if peaks.len() < 2 {
        // Fall back to the naive peak picker if the adaptive method underperformed.
        let fallback = fallback_peak_picker(ts, cfg);
        debug!("adaptive picker found {} peak(s), fallback found {}", peaks.len(), fallback.len());
        return Events::from_indices(fallback);
    }

    Events::from_indices(peaks)
}

/// Band-limit, differentiate, square and integrate. Returns the band-limited
/// trace (for locating the precise peak) and the integrated envelope.
fn pan_tompkins_envelope(ts: &TimeSeries, cfg: &EcgPipelineConfig) -> (Vec<f64>, Vec<f64>) {
    let fs = ts.fs.max(1.0);
    let mut band = ts.data.clone();
    if cfg.lowcut_hz > 0.0 {
        band = single_pole(&band, fs, cfg.lowcut_hz, Pole::High);
    }
    if cfg.highcut_hz > 0.0 && cfg.highcut_hz < fs * 0.5 {
        band = single_pole(&band, fs, cfg.highcut_hz, Pole::Low);
    }
    let energy: Vec<f64> = std::iter::once(0.0)
        .chain(band.windows(2).map(|w| (w[1] - w[0]).powi(2)))
        .collect();
    let win = ((cfg.integration_window_s * fs).round() as usize).max(1);
    let envelope = moving_average(&energy, win);
    (band, envelope)
}

#[derive(Clone, Copy)]
enum Pole {
    High,
    Low,
}

/// First-order RC section seeded with the first sample.
fn single_pole(data: &[f64], fs: f64, cutoff: f64, pole: Pole) -> Vec<f64> {
    let Some(&first) = data.first() else {
        return Vec::new();
    };
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff.max(0.01));
    let mut out = Vec::with_capacity(data.len());
    match pole {
        Pole::High => {
            let alpha = rc / (rc + dt);
            let (mut prev_y, mut prev_x) = (first, first);
            for &x in data {
                prev_y = alpha * (prev_y + x - prev_x);
                prev_x = x;
                out.push(prev_y);
            }
        }
        Pole::Low => {
            let alpha = dt / (rc + dt);
            let mut prev = first;
            for &x in data {
                prev += alpha * (x - prev);
                out.push(prev);
            }
        }
    }
    out
}

/// Trailing mean over `win` samples; the first `win - 1` outputs are divided
/// by the full window as well.
fn moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if win <= 1 {
        return data.to_vec();
    }
    let mut acc = 0.0;
    data.iter()
        .enumerate()
        .map(|(i, &sample)| {
            acc += sample;
            if i >= win {
                acc -= data[i - win];
            }
            acc / win as f64
        })
        .collect()
}

fn pick_peaks(band: &[f64], envelope: &[f64], fs: f64, cfg: &EcgPipelineConfig) -> Vec<usize> {
    if band.is_empty() || envelope.is_empty() {
        return Vec::new();
    }

    let refractory = (cfg.min_rr_s * fs).round().max(1.0) as usize;
    let search = (cfg.search_back_s * fs).round().max(1.0) as usize;

    // seed both levels from the first second of envelope
    let init = envelope.len().min((fs as usize).max(1));
    let avg = envelope[..init].iter().sum::<f64>() / init as f64;
    let mut signal_level = avg;
    let mut noise_level = avg * 0.5;
    let threshold_of =
        |signal: f64, noise: f64| noise + cfg.threshold_scale * (signal - noise).max(0.0);
    let mut threshold = threshold_of(signal_level, noise_level);
    let mut last_trigger: Option<usize> = None;
    let mut peaks = Vec::new();

    for (i, &sample) in envelope.iter().enumerate() {
        let refractory_ok = last_trigger.map_or(true, |last| i - last >= refractory);
        if sample >= threshold && refractory_ok {
            let start = i.saturating_sub(search);
            let end = i.min(band.len() - 1);
            let mut idx = start;
            let mut max_val = f64::MIN;
            for (j, &v) in band.iter().enumerate().take(end + 1).skip(start) {
                if v > max_val {
                    max_val = v;
                    idx = j;
                }
            }
            peaks.push(idx);
            last_trigger = Some(i);
            signal_level = 0.125 * sample + 0.875 * signal_level;
        } else {
            noise_level = 0.125 * sample + 0.875 * noise_level;
        }
        threshold = threshold_of(signal_level, noise_level);
    }

    peaks.sort_unstable();
    peaks.dedup();
    peaks
}

/// Local maxima above a 150 ms moving baseline, spaced by the refractory gap.
fn fallback_peak_picker(ts: &TimeSeries, cfg: &EcgPipelineConfig) -> Vec<usize> {
    let data = &ts.data;
    if data.len() < 3 {
        return Vec::new();
    }
    let min_gap = (cfg.min_rr_s * ts.fs).max(1.0) as usize;
    let win = ((0.150 * ts.fs) as usize).max(1);
    let baseline = moving_average(data, win);
    let detrended: Vec<f64> = data.iter().zip(&baseline).map(|(x, m)| x - m).collect();

    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..detrended.len() - 1 {
        let y = detrended[i];
        let is_peak = y > 0.0 && y > detrended[i - 1] && y > detrended[i + 1];
        let spaced = peaks.last().map_or(true, |&last| i - last >= min_gap);
        if is_peak && spaced {
            peaks.push(i);
        }
    }
    peaks
}
