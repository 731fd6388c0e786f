//! One-record request/response boundary.
//!
//! A run stages the uploaded triplet in its own temporary directory, runs the
//! pipeline, writes both artifacts next to the inputs, reads them back and
//! returns them. The directory is removed when the [`RunContext`] drops,
//! whether the run succeeded or not.

use crate::config::PipelineConfig;
use crate::detectors::{AnnotationPeaks, EnvelopeDetector, PeakDetector};
use crate::error::{PqrstError, Result};
use crate::io::wfdb::RecordFiles;
use crate::output::ArtifactPaths;
use crate::pipeline::run_record;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The three uploaded artifacts of one record. A `None` part was not uploaded.
#[derive(Debug, Clone, Default)]
pub struct RecordUpload {
    pub record_id: String,
    pub header: Option<Vec<u8>>,
    pub data: Option<Vec<u8>>,
    pub annotations: Option<Vec<u8>>,
}

impl RecordUpload {
    pub fn new(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            ..Self::default()
        }
    }

    /// Read whichever of `<dir>/<record_id>.{hea,dat,atr}` exist.
    pub fn from_dir(dir: &Path, record_id: &str) -> std::io::Result<Self> {
        let files = RecordFiles::in_dir(dir, record_id);
        let read = |path: &Path| -> std::io::Result<Option<Vec<u8>>> {
            if path.is_file() {
                fs::read(path).map(Some)
            } else {
                Ok(None)
            }
        };
        Ok(Self {
            record_id: record_id.to_string(),
            header: read(&files.header)?,
            data: read(&files.data)?,
            annotations: read(&files.annotations)?,
        })
    }
}

/// Where R-peaks come from for a boundary run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeakSource {
    /// Adaptive-threshold detector on the filtered trace.
    #[default]
    Detector,
    /// Beat labels from the uploaded `.atr` file.
    Annotations,
}

/// Per-run scratch space for inputs and outputs.
pub struct RunContext {
    dir: TempDir,
    record_id: String,
}

impl RunContext {
    pub fn new(record_id: &str) -> Result<Self> {
        validate_record_id(record_id)?;
        let dir = tempfile::Builder::new()
            .prefix("pqrst-run-")
            .tempdir()
            .map_err(|e| PqrstError::Serialization(format!("creating run directory: {}", e)))?;
        Ok(Self {
            dir,
            record_id: record_id.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn input_files(&self) -> RecordFiles {
        RecordFiles::in_dir(&self.dir.path().join("uploads"), &self.record_id)
    }

    pub fn output_paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.dir.path().join("outputs"), &self.record_id)
    }

    /// Write the uploaded parts into the run's upload directory.
    pub fn stage(&self, upload: &RecordUpload) -> Result<()> {
        let files = self.input_files();
        let uploads = self.dir.path().join("uploads");
        fs::create_dir_all(&uploads).map_err(|e| staging_error(&uploads, e))?;
        let parts = [
            (&files.header, &upload.header),
            (&files.data, &upload.data),
            (&files.annotations, &upload.annotations),
        ];
        for (path, bytes) in parts {
            if let Some(bytes) = bytes {
                fs::write(path, bytes).map_err(|e| staging_error(path, e))?;
            }
        }
        Ok(())
    }
}

fn staging_error(path: &Path, err: std::io::Error) -> PqrstError {
    PqrstError::Serialization(format!("staging {}: {}", path.display(), err))
}

/// Record ids become file names; keep them to one plain path component.
fn validate_record_id(record_id: &str) -> Result<()> {
    let ok = !record_id.is_empty()
        && record_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(PqrstError::InvalidRequest(format!(
            "record id {:?} must be non-empty and use only [A-Za-z0-9_-]",
            record_id
        )))
    }
}

/// Successful response: both artifacts as serialized JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub plot: String,
    pub phases: String,
}

/// Failed response: coarse category plus a readable detail string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

impl From<&PqrstError> for ErrorResponse {
    fn from(err: &PqrstError) -> Self {
        Self {
            error: err.category().to_string(),
            details: err.to_string(),
        }
    }
}

/// Run one record end to end inside a fresh [`RunContext`].
pub fn respond(
    upload: &RecordUpload,
    peaks: PeakSource,
    cfg: &PipelineConfig,
) -> std::result::Result<RunResponse, ErrorResponse> {
    let outcome = RunContext::new(&upload.record_id)
        .and_then(|ctx| run_in(ctx, upload, peaks, cfg));
    outcome.map_err(|err| {
        error!("record {} failed: {}", upload.record_id, err);
        ErrorResponse::from(&err)
    })
}

/// Run `upload` under the context's record id, then remove the context.
pub fn run_in(
    ctx: RunContext,
    upload: &RecordUpload,
    peaks: PeakSource,
    cfg: &PipelineConfig,
) -> Result<RunResponse> {
    let result = process_in(&ctx, upload, peaks, cfg);
    debug!("removing run directory {}", ctx.path().display());
    result
}

fn process_in(
    ctx: &RunContext,
    upload: &RecordUpload,
    peaks: PeakSource,
    cfg: &PipelineConfig,
) -> Result<RunResponse> {
    ctx.stage(upload)?;
    let uploads: PathBuf = ctx.path().join("uploads");
    let files = RecordFiles::locate(&uploads, ctx.record_id())?;
    let detector: Box<dyn PeakDetector> = match peaks {
        PeakSource::Detector => Box::new(EnvelopeDetector::new(cfg.detector)),
        PeakSource::Annotations => Box::new(AnnotationPeaks::new(&files.annotations)),
    };
    let output = run_record(&files, detector.as_ref(), cfg)?;
    let paths = output
        .artifacts(cfg)
        .write(&ctx.path().join("outputs"), ctx.record_id())?;
    let (plot, phases) = paths.read_back()?;
    info!(
        "record {}: {} phase interval(s)",
        ctx.record_id(),
        output.phases.len()
    );
    Ok(RunResponse { plot, phases })
}
