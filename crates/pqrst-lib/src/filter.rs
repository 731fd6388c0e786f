use crate::error::{PqrstError, Result};
use crate::signal::TimeSeries;
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Band-pass design parameters. Cutoffs are in Hz and are normalized by the
/// Nyquist frequency of the trace they are applied to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub low_hz: f64,
    pub high_hz: f64,
    pub taps: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            low_hz: 3.0,
            high_hz: 45.0,
            taps: 101,
        }
    }
}

/// Linear-phase FIR band-pass kernel (Hamming-windowed sinc).
#[derive(Debug, Clone)]
pub struct FirBandpass {
    taps: Vec<f64>,
}

impl FirBandpass {
    /// Design a band-pass kernel for a trace sampled at `fs`.
    ///
    /// Even tap counts are bumped to the next odd value so the impulse
    /// response stays symmetric.
    pub fn design(fs: f64, low_hz: f64, high_hz: f64, tap_count: usize) -> Result<Self> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(PqrstError::InvalidFilterParameters(format!(
                "sampling rate must be positive, got {}",
                fs
            )));
        }
        if tap_count < 1 {
            return Err(PqrstError::InvalidFilterParameters(
                "tap count must be at least 1".into(),
            ));
        }
        let nyquist = 0.5 * fs;
        let low = low_hz / nyquist;
        let high = high_hz / nyquist;
        if !(low.is_finite() && high.is_finite()) || low <= 0.0 || high >= 1.0 || low >= high {
            return Err(PqrstError::InvalidFilterParameters(format!(
                "cutoffs {} Hz..{} Hz normalize to {:.4}..{:.4}; need 0 < low < high < 1",
                low_hz, high_hz, low, high
            )));
        }

        let n = odd_tap_count(tap_count);
        let center = (n - 1) as f64 / 2.0;
        let window = hamming(n);
        let mut taps: Vec<f64> = (0..n)
            .map(|i| {
                let m = i as f64 - center;
                (high * sinc(high * m) - low * sinc(low * m)) * window[i]
            })
            .collect();

        // unit gain at the passband centre
        let f_center = 0.5 * (low + high);
        let gain: f64 = taps
            .iter()
            .enumerate()
            .map(|(i, h)| h * (PI * (i as f64 - center) * f_center).cos())
            .sum();
        if gain.abs() < f64::EPSILON {
            return Err(PqrstError::InvalidFilterParameters(
                "band too narrow for the requested tap count".into(),
            ));
        }
        for h in &mut taps {
            *h /= gain;
        }
        debug!(
            "designed FIR band-pass: {} taps, {:.4}..{:.4} of Nyquist",
            n, low, high
        );
        Ok(Self { taps })
    }

    pub fn from_config(fs: f64, cfg: &FilterConfig) -> Result<Self> {
        Self::design(fs, cfg.low_hz, cfg.high_hz, cfg.taps)
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Causal convolution with zero history before the first sample.
    /// The first `len() - 1` outputs carry the start-up transient.
    pub fn apply(&self, data: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(data.len());
        for n in 0..data.len() {
            let reach = n.min(self.taps.len() - 1);
            let mut acc = 0.0;
            for k in 0..=reach {
                acc += self.taps[k] * data[n - k];
            }
            out.push(acc);
        }
        out
    }
}

/// Smallest odd number that is `>= requested`.
pub fn odd_tap_count(requested: usize) -> usize {
    if requested % 2 == 0 {
        requested + 1
    } else {
        requested
    }
}

/// Design and apply a band-pass filter in one call, returning a new trace of
/// the same length.
pub fn apply_bandpass(
    trace: &[f64],
    fs: f64,
    low_hz: f64,
    high_hz: f64,
    tap_count: usize,
) -> Result<Vec<f64>> {
    let fir = FirBandpass::design(fs, low_hz, high_hz, tap_count)?;
    Ok(fir.apply(trace))
}

/// Filter a whole `TimeSeries` with the configured band.
pub fn bandpass_series(ts: &TimeSeries, cfg: &FilterConfig) -> Result<TimeSeries> {
    let fir = FirBandpass::from_config(ts.fs, cfg)?;
    Ok(TimeSeries::new(ts.fs, fir.apply(&ts.data)))
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn output_length_matches_input() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let len = rng.gen_range(1..800);
            let taps = rng.gen_range(1..160);
            let data: Vec<f64> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let out = apply_bandpass(&data, 360.0, 3.0, 45.0, taps).expect("valid filter");
            assert_eq!(out.len(), len);
        }
    }

    #[test]
    fn tap_count_is_forced_odd() {
        for requested in 1..64 {
            let fir = FirBandpass::design(250.0, 3.0, 45.0, requested).expect("design");
            assert_eq!(fir.len() % 2, 1);
            assert!(fir.len() >= requested);
            assert!(fir.len() <= requested + 1);
        }
    }

    #[test]
    fn kernel_is_symmetric() {
        let fir = FirBandpass::design(360.0, 3.0, 45.0, 100).expect("design");
        let taps = fir.taps();
        assert_eq!(taps.len(), 101);
        for i in 0..taps.len() / 2 {
            assert!((taps[i] - taps[taps.len() - 1 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn passband_centre_has_unit_gain_and_stopbands_attenuate() {
        let fs = 360.0;
        let fir = FirBandpass::design(fs, 3.0, 45.0, 101).expect("design");
        let centre_hz = 24.0;
        let response = |f_hz: f64| {
            let w = 2.0 * PI * f_hz / fs;
            let (re, im) = fir
                .taps()
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(re, im), (k, h)| {
                    (re + h * (w * k as f64).cos(), im - h * (w * k as f64).sin())
                });
            (re * re + im * im).sqrt()
        };
        assert!((response(centre_hz) - 1.0).abs() < 0.02);
        // 101 taps only partially resolve a 3 Hz edge at 360 Hz
        assert!(response(0.0) < 0.5);
        assert!(response(150.0) < 0.01);
    }

    #[test]
    fn all_zero_trace_stays_zero() {
        let fs = 250.0;
        let data = vec![0.0; (10.0 * fs) as usize];
        let out = apply_bandpass(&data, fs, 3.0, 45.0, 101).expect("filter");
        assert_eq!(out.len(), data.len());
        assert!(out.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn impulse_response_reproduces_taps() {
        let fir = FirBandpass::design(250.0, 5.0, 40.0, 31).expect("design");
        let mut impulse = vec![0.0; 50];
        impulse[0] = 1.0;
        let out = fir.apply(&impulse);
        for (k, h) in fir.taps().iter().enumerate() {
            assert!((out[k] - h).abs() < 1e-15);
        }
        assert!(out[31..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn input_is_not_mutated() {
        let data = vec![1.0, -2.0, 3.0, 0.5];
        let copy = data.clone();
        let _ = apply_bandpass(&data, 250.0, 3.0, 45.0, 11).expect("filter");
        assert_eq!(data, copy);
    }

    #[test]
    fn rejects_malformed_requests() {
        let data = vec![0.0; 16];
        let cases = [
            (250.0, 45.0, 3.0, 11),
            (250.0, 10.0, 10.0, 11),
            (250.0, 0.0, 45.0, 11),
            (250.0, 3.0, 125.0, 11),
            (0.0, 3.0, 45.0, 11),
            (-1.0, 3.0, 45.0, 11),
            (250.0, 3.0, 45.0, 0),
        ];
        for (fs, low, high, taps) in cases {
            let err = apply_bandpass(&data, fs, low, high, taps).unwrap_err();
            assert!(
                matches!(err, PqrstError::InvalidFilterParameters(_)),
                "{:?} -> {:?}",
                (fs, low, high, taps),
                err
            );
        }
    }
}
