use crate::error::{PqrstError, Result as PqrstResult};
use crate::signal::{Events, TimeSeries};
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use wfdb_rust::header::{self, SignalSpecLine, StorageFormat};
use wfdb_rust::signal;

/// WFDB default when the header omits the sampling frequency.
const DEFAULT_FS: f64 = 250.0;
/// WFDB default ADC gain (units per millivolt) for a missing or zero gain.
const DEFAULT_GAIN: f64 = 200.0;

/// The header/data/annotation triplet of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFiles {
    pub header: PathBuf,
    pub data: PathBuf,
    pub annotations: PathBuf,
}

impl RecordFiles {
    /// Paths `<dir>/<record_id>.{hea,dat,atr}`, without checking existence.
    pub fn in_dir(dir: &Path, record_id: &str) -> Self {
        Self {
            header: dir.join(format!("{}.hea", record_id)),
            data: dir.join(format!("{}.dat", record_id)),
            annotations: dir.join(format!("{}.atr", record_id)),
        }
    }

    /// Locate all three artifacts, failing with every missing path listed.
    pub fn locate(dir: &Path, record_id: &str) -> PqrstResult<Self> {
        let files = Self::in_dir(dir, record_id);
        let missing: Vec<PathBuf> = [&files.header, &files.data, &files.annotations]
            .into_iter()
            .filter(|p| !p.is_file())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PqrstError::MissingInput(missing));
        }
        Ok(files)
    }
}

/// Fields of the header's record line that the loader relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderSummary {
    pub record_name: String,
    pub signal_count: usize,
    pub fs: f64,
    pub sample_count: Option<usize>,
}

/// Parse the record line (`<name> <nsig> [fs[/counter][(base)]] [nsamp] ...`)
/// of a WFDB header.
pub fn parse_header_summary(text: &str) -> PqrstResult<HeaderSummary> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .ok_or_else(|| PqrstError::RecordFormat("header has no record line".into()))?;
    let mut fields = line.split_whitespace();
    let record_name = fields
        .next()
        .map(|name| name.split('/').next().unwrap_or(name).to_string())
        .ok_or_else(|| PqrstError::RecordFormat("header record line is empty".into()))?;
    let signal_count = fields
        .next()
        .ok_or_else(|| PqrstError::RecordFormat("header is missing the signal count".into()))?
        .parse::<usize>()
        .map_err(|e| PqrstError::RecordFormat(format!("bad signal count: {}", e)))?;
    if signal_count == 0 {
        return Err(PqrstError::RecordFormat("record declares no signals".into()));
    }
    let fs = match fields.next() {
        Some(token) => {
            let freq = token.split(['/', '(']).next().unwrap_or(token);
            freq.parse::<f64>().map_err(|e| {
                PqrstError::RecordFormat(format!("bad sampling frequency {}: {}", token, e))
            })?
        }
        None => DEFAULT_FS,
    };
    if !(fs.is_finite() && fs > 0.0) {
        return Err(PqrstError::RecordFormat(format!(
            "sampling frequency must be positive, got {}",
            fs
        )));
    }
    let sample_count = match fields.next() {
        Some(token) => Some(
            token
                .parse::<usize>()
                .map_err(|e| PqrstError::RecordFormat(format!("bad sample count: {}", e)))?,
        ),
        None => None,
    };
    Ok(HeaderSummary {
        record_name,
        signal_count,
        fs,
        sample_count,
    })
}

/// Signal lines that follow the record line, one per declared signal.
fn signal_lines(text: &str, signal_count: usize) -> PqrstResult<Vec<&str>> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .skip(1)
        .take(signal_count)
        .collect();
    if lines.len() < signal_count {
        return Err(PqrstError::RecordFormat(format!(
            "header declares {} signal(s) but has {} signal line(s)",
            signal_count,
            lines.len()
        )));
    }
    Ok(lines)
}

fn parse_signal_spec(line: &str) -> PqrstResult<SignalSpecLine> {
    // the header parser panics on malformed fields
    catch_unwind(AssertUnwindSafe(|| header::parse_signal_line(line)))
        .map_err(|_| PqrstError::RecordFormat(format!("unreadable signal line {:?}", line)))
}

/// Reject signal layouts the decoder cannot read faithfully.
fn check_signal_specs(specs: &[SignalSpecLine]) -> PqrstResult<()> {
    let Some(first) = specs.first() else {
        return Err(PqrstError::RecordFormat("header has no signal lines".into()));
    };
    for spec in specs {
        let bare = Path::new(&spec.filename)
            .file_name()
            .is_some_and(|name| name == spec.filename.as_str());
        if !bare {
            return Err(PqrstError::RecordFormat(format!(
                "signal file {:?} must be a plain file name",
                spec.filename
            )));
        }
        if spec.filename != first.filename {
            return Err(PqrstError::RecordFormat(format!(
                "signals span several data files ({} and {})",
                first.filename, spec.filename
            )));
        }
        if spec.format != StorageFormat::_12bit_twos_complement {
            return Err(PqrstError::RecordFormat(format!(
                "unsupported storage format {} in {}, only 212 is decoded",
                spec.format as u32, spec.filename
            )));
        }
        if spec.samples_per_frame.is_some_and(|n| n > 1) {
            return Err(PqrstError::RecordFormat(format!(
                "multi-frequency signal in {} is not supported",
                spec.filename
            )));
        }
        if spec.byte_offset != first.byte_offset {
            return Err(PqrstError::RecordFormat(
                "signals in one data file disagree on the byte offset".into(),
            ));
        }
    }
    Ok(())
}

/// Decode one lead of a format-212 data buffer holding `specs.len()`
/// interleaved signals, in physical units.
fn decode_lead(buf: &[u8], specs: &[SignalSpecLine], lead: usize) -> PqrstResult<Vec<f64>> {
    let spec = specs.get(lead).ok_or_else(|| {
        PqrstError::RecordFormat(format!(
            "record contains {} signal(s), but lead {} was requested",
            specs.len(),
            lead
        ))
    })?;
    let offset = spec.byte_offset.unwrap_or(0) as usize;
    let frames = buf.get(offset..).ok_or_else(|| {
        PqrstError::RecordFormat(format!(
            "byte offset {} lies past the {}-byte data file",
            offset,
            buf.len()
        ))
    })?;
    let gain = spec
        .adc_gain
        .map(f64::from)
        .filter(|g| *g > 0.0)
        .unwrap_or(DEFAULT_GAIN);
    let baseline = spec.baseline.or(spec.adc_zero).unwrap_or(0) as f64;
    Ok(signal::parse_212_format(frames)
        .into_iter()
        .skip(lead)
        .step_by(specs.len())
        .map(|sample| (sample as f64 - baseline) / gain)
        .collect())
}

/// Load the first channel of a located record, classifying every failure as
/// a record format error. Samples always come from `files.data`, whatever
/// file name the header's signal lines carry.
pub fn load_record(files: &RecordFiles) -> PqrstResult<TimeSeries> {
    let text = fs::read_to_string(&files.header).map_err(|e| {
        PqrstError::RecordFormat(format!("{}: {}", files.header.display(), e))
    })?;
    let summary = parse_header_summary(&text)?;
    let specs = signal_lines(&text, summary.signal_count)?
        .into_iter()
        .map(parse_signal_spec)
        .collect::<PqrstResult<Vec<_>>>()?;
    check_signal_specs(&specs)?;
    debug!(
        "header {}: {} signal(s) at {} Hz in {}",
        summary.record_name, summary.signal_count, summary.fs, specs[0].filename
    );

    let buf = fs::read(&files.data)
        .map_err(|e| PqrstError::RecordFormat(format!("{}: {}", files.data.display(), e)))?;
    let mut data = decode_lead(&buf, &specs, 0)?;
    if let Some(declared) = summary.sample_count.filter(|&n| n > 0) {
        if data.len() < declared {
            return Err(PqrstError::RecordFormat(format!(
                "{} holds {} sample(s), header declares {}",
                files.data.display(),
                data.len(),
                declared
            )));
        }
        data.truncate(declared);
    }

    let ts = TimeSeries::new(summary.fs, data);
    ts.validate()?;
    info!(
        "loaded record {}: {} samples at {} Hz ({:.1} s)",
        summary.record_name,
        ts.len(),
        ts.fs,
        ts.duration()
    );
    Ok(ts)
}

/// Simple WFDB annotation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WfdbAnnotation {
    pub sample: usize,
    pub code: u8,
}

impl WfdbAnnotation {
    /// WFDB beat labels: codes 1 to 13 (N through E) plus BBB, LEARN, FLWAV,
    /// AESC, SVESC, NAPC and PFUS.
    pub fn is_beat(&self) -> bool {
        matches!(self.code, 1..=13 | 25 | 30 | 31 | 34 | 35 | 37 | 38)
    }
}

/// Parse MIT annotation binary stream into samples & codes.
pub fn parse_wfdb_annotations(buf: &[u8]) -> Vec<WfdbAnnotation> {
    let mut out = Vec::new();
    let mut words = buf.chunks_exact(2).map(|w| u16::from_le_bytes([w[0], w[1]]));
    let mut sample: usize = 0;
    while let Some(word) = words.next() {
        let code = (word >> 10) as u8;
        let diff = (word & 0x03FF) as usize;
        match (code, diff) {
            (0, 0) => break,
            // SKIP: 32-bit interval in the next two words, high half first
            (59, _) => {
                let (Some(high), Some(low)) = (words.next(), words.next()) else {
                    break;
                };
                let skip = ((high as u32) << 16) | low as u32;
                sample = sample.wrapping_add(skip as usize);
            }
            // NUM/SUB/CHN carry no sample of their own
            (60..=62, _) => sample = sample.wrapping_add(diff),
            // AUX: `diff` payload bytes, padded to a whole word
            (63, _) => {
                for _ in 0..(diff + 1) / 2 {
                    if words.next().is_none() {
                        break;
                    }
                }
            }
            _ => {
                sample = sample.wrapping_add(diff);
                out.push(WfdbAnnotation { sample, code });
            }
        }
    }
    out
}

/// Read WFDB annotation file (ATR) and convert to beat events.
pub fn load_wfdb_events(path: &Path) -> Result<Events> {
    let buf = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let beat_samples: Vec<usize> = parse_wfdb_annotations(&buf)
        .into_iter()
        .filter(WfdbAnnotation::is_beat)
        .map(|ann| ann.sample)
        .collect();
    Ok(Events::from_indices(beat_samples))
}
