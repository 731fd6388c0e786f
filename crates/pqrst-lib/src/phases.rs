use crate::landmarks::BeatLandmarks;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "PQ")]
    Pq,
    #[serde(rename = "QRS")]
    Qrs,
    #[serde(rename = "ST")]
    St,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Pq => "PQ",
            Phase::Qrs => "QRS",
            Phase::St => "ST",
        }
    }
}

/// A named span between two landmarks of one beat, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseInterval {
    pub entry: f64,
    pub duration: f64,
    pub phase: Phase,
}

impl PhaseInterval {
    fn between(start: usize, end: usize, fs: f64, phase: Phase) -> Self {
        let entry = start as f64 / fs;
        Self {
            entry,
            duration: end as f64 / fs - entry,
            phase,
        }
    }
}

/// How landmarks are paired into intervals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhasePairing {
    /// Endpoints always come from the same beat.
    #[default]
    PerBeat,
    /// Each wave's defined indices are compacted on their own and then zipped
    /// by position. Beats with different missing waves end up mixed; kept only
    /// for output compatibility with older exports.
    WaveAligned,
}

/// Convert per-beat landmarks into PQ, QRS and ST intervals, beat by beat.
pub fn build_phases(landmarks: &[BeatLandmarks], fs: f64) -> Vec<PhaseInterval> {
    let mut phases = Vec::with_capacity(landmarks.len() * 3);
    for beat in landmarks {
        if let (Some(p), Some(q)) = (beat.p, beat.q) {
            phases.push(PhaseInterval::between(p, q, fs, Phase::Pq));
        }
        if let (Some(q), Some(s)) = (beat.q, beat.s) {
            phases.push(PhaseInterval::between(q, s, fs, Phase::Qrs));
        }
        if let (Some(s), Some(t)) = (beat.s, beat.t) {
            phases.push(PhaseInterval::between(s, t, fs, Phase::St));
        }
    }
    phases
}

fn build_phases_wave_aligned(landmarks: &[BeatLandmarks], fs: f64) -> Vec<PhaseInterval> {
    let compact = |pick: fn(&BeatLandmarks) -> Option<usize>| -> Vec<usize> {
        landmarks.iter().filter_map(pick).collect()
    };
    let p = compact(|b| b.p);
    let q = compact(|b| b.q);
    let s = compact(|b| b.s);
    let t = compact(|b| b.t);
    let rows = p.len().min(q.len()).min(s.len()).min(t.len());

    let mut phases = Vec::with_capacity(rows * 3);
    for i in 0..rows {
        phases.push(PhaseInterval::between(p[i], q[i], fs, Phase::Pq));
        phases.push(PhaseInterval::between(q[i], s[i], fs, Phase::Qrs));
        phases.push(PhaseInterval::between(s[i], t[i], fs, Phase::St));
    }
    phases
}

pub fn build_phases_with(
    landmarks: &[BeatLandmarks],
    fs: f64,
    pairing: PhasePairing,
) -> Vec<PhaseInterval> {
    match pairing {
        PhasePairing::PerBeat => build_phases(landmarks, fs),
        PhasePairing::WaveAligned => build_phases_wave_aligned(landmarks, fs),
    }
}
