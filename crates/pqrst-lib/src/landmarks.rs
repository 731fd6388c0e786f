use crate::signal::Events;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Search window widths (seconds) around each R-peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkWindows {
    /// Half-width of the Q (before R) and S (after R) minimum search.
    pub qs_s: f64,
    /// Look-back from Q for the P maximum.
    pub p_s: f64,
    /// Look-ahead from S for the T maximum.
    pub t_s: f64,
}

impl Default for LandmarkWindows {
    fn default() -> Self {
        Self {
            qs_s: 0.08,
            p_s: 0.2,
            t_s: 0.4,
        }
    }
}

impl LandmarkWindows {
    fn widths(&self, fs: f64) -> (usize, usize, usize) {
        (
            seconds_to_samples(self.qs_s, fs),
            seconds_to_samples(self.p_s, fs),
            seconds_to_samples(self.t_s, fs),
        )
    }
}

/// Landmarks of one heartbeat. `r` is the detector's index; the other waves
/// are `None` when their search window was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatLandmarks {
    pub p: Option<usize>,
    pub q: Option<usize>,
    pub r: usize,
    pub s: Option<usize>,
    pub t: Option<usize>,
}

impl BeatLandmarks {
    fn bare(r: usize) -> Self {
        Self {
            p: None,
            q: None,
            r,
            s: None,
            t: None,
        }
    }
}

/// Locate P, Q, S and T for every R-peak, one record per peak in input order.
pub fn locate_landmarks(filtered: &[f64], r_peaks: &Events, fs: f64) -> Vec<BeatLandmarks> {
    locate_landmarks_with(filtered, r_peaks, fs, &LandmarkWindows::default())
}

pub fn locate_landmarks_with(
    filtered: &[f64],
    r_peaks: &Events,
    fs: f64,
    windows: &LandmarkWindows,
) -> Vec<BeatLandmarks> {
    let n = filtered.len();
    let (qs, p_back, t_ahead) = windows.widths(fs);
    let mut out = Vec::with_capacity(r_peaks.len());
    let mut out_of_range = 0usize;

    for &r in &r_peaks.indices {
        if r >= n {
            out_of_range += 1;
            out.push(BeatLandmarks::bare(r));
            continue;
        }
        let q = argmin(filtered, before(r, qs));
        let s = argmin(filtered, after(r, qs, n));
        let p = q.and_then(|q| argmax(filtered, before(q, p_back)));
        let t = s.and_then(|s| argmax(filtered, after(s, t_ahead, n)));
        out.push(BeatLandmarks { p, q, r, s, t });
    }

    if out_of_range > 0 {
        warn!(
            "{} R-peak(s) beyond the {}-sample trace; landmarks left undefined",
            out_of_range, n
        );
    }
    debug!("located landmarks for {} beat(s)", out.len());
    out
}

/// Whole samples covered by `seconds`, truncated toward zero.
fn seconds_to_samples(seconds: f64, fs: f64) -> usize {
    let samples = seconds * fs;
    if samples.is_finite() && samples > 0.0 {
        samples as usize
    } else {
        0
    }
}

/// `[max(0, anchor - width), anchor)`
fn before(anchor: usize, width: usize) -> Range<usize> {
    anchor.saturating_sub(width)..anchor
}

/// `[anchor, min(n, anchor + width))`, never starting past its end.
fn after(anchor: usize, width: usize, n: usize) -> Range<usize> {
    let end = anchor.saturating_add(width).min(n);
    anchor.min(end)..end
}

/// Index of the first minimum inside `window`, `None` for an empty window.
fn argmin(data: &[f64], window: Range<usize>) -> Option<usize> {
    extreme(data, window, |candidate, best| candidate < best)
}

/// Index of the first maximum inside `window`, `None` for an empty window.
fn argmax(data: &[f64], window: Range<usize>) -> Option<usize> {
    extreme(data, window, |candidate, best| candidate > best)
}

fn extreme(data: &[f64], window: Range<usize>, better: impl Fn(f64, f64) -> bool) -> Option<usize> {
    if window.is_empty() {
        return None;
    }
    let start = window.start;
    let mut best_idx = start;
    let mut best_val = data[start];
    for idx in window.skip(1) {
        if better(data[idx], best_val) {
            best_val = data[idx];
            best_idx = idx;
        }
    }
    Some(best_idx)
}
