use super::PeakDetector;
use crate::io::wfdb;
use crate::signal::{Events, TimeSeries};
use log::debug;
use std::path::PathBuf;

/// Uses the beat annotations stored next to the record (`<id>.atr`) as R-peaks.
#[derive(Debug, Clone)]
pub struct AnnotationPeaks {
    pub path: PathBuf,
}

impl AnnotationPeaks {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PeakDetector for AnnotationPeaks {
    fn name(&self) -> &'static str {
        "annotations"
    }

    fn detect(&self, ts: &TimeSeries) -> anyhow::Result<Events> {
        let events = wfdb::load_wfdb_events(&self.path)?;
        Ok(clip_to_trace(events, ts.len()))
    }
}

/// Keep annotation samples that fall inside the trace, ascending and unique.
fn clip_to_trace(events: Events, len: usize) -> Events {
    let total = events.len();
    let mut indices: Vec<usize> = events.indices.into_iter().filter(|&i| i < len).collect();
    indices.sort_unstable();
    indices.dedup();
    if indices.len() != total {
        debug!("kept {} of {} annotated beats", indices.len(), total);
    }
    Events::from_indices(indices)
}
