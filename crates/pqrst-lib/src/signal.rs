use crate::error::{PqrstError, Result};
use serde::{Deserialize, Serialize};

/// Basic typed time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn new(fs: f64, data: Vec<f64>) -> Self {
        Self { fs, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }

    /// Check the waveform invariants: at least one sample, a positive
    /// sampling rate and finite amplitudes only.
    pub fn validate(&self) -> Result<()> {
        if !(self.fs.is_finite() && self.fs > 0.0) {
            return Err(PqrstError::RecordFormat(format!(
                "sampling rate must be positive, got {}",
                self.fs
            )));
        }
        if self.data.is_empty() {
            return Err(PqrstError::RecordFormat("record contains no samples".into()));
        }
        if let Some(idx) = self.data.iter().position(|v| !v.is_finite()) {
            return Err(PqrstError::RecordFormat(format!(
                "sample {} is not a finite number",
                idx
            )));
        }
        Ok(())
    }
}

/// Point events on a timeline (e.g., R-peaks indices)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_non_finite_samples() {
        let ts = TimeSeries::new(250.0, vec![0.0, f64::NAN, 1.0]);
        let err = ts.validate().unwrap_err();
        assert_eq!(err.category(), "record_format");
    }

    #[test]
    fn validate_rejects_zero_rate_and_empty_data() {
        assert!(TimeSeries::new(0.0, vec![1.0]).validate().is_err());
        assert!(TimeSeries::new(360.0, Vec::new()).validate().is_err());
        assert!(TimeSeries::new(360.0, vec![0.5]).validate().is_ok());
    }

    #[test]
    fn duration_uses_sampling_rate() {
        let ts = TimeSeries::new(250.0, vec![0.0; 500]);
        assert!((ts.duration() - 2.0).abs() < 1e-12);
    }
}
