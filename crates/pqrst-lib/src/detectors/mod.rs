pub mod annotations;
pub mod ecg;

use crate::signal::{Events, TimeSeries};

/// Source of R-peak indices for a filtered trace.
///
/// Implementations return ascending indices inside `[0, ts.len())`. An `Err`
/// is not fatal to a run: the pipeline logs it and continues with no beats.
pub trait PeakDetector {
    fn name(&self) -> &'static str;
    fn detect(&self, ts: &TimeSeries) -> anyhow::Result<Events>;
}

pub use annotations::AnnotationPeaks;
pub use ecg::{EcgPipelineConfig, EnvelopeDetector};
