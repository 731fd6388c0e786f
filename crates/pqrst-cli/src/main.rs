use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use pqrst_lib::{
    boundary::{self, PeakSource, RecordUpload},
    config::PipelineConfig,
    detectors::{AnnotationPeaks, EnvelopeDetector, PeakDetector},
    io::{text as text_io, wfdb as wfdb_io},
    output::Artifacts,
    phases::{PhaseInterval, PhasePairing},
    pipeline::{run_pipeline, PipelineOutput},
    plot::{figure_from_artifacts, Figure, Series},
    signal::{Events, TimeSeries},
};
use plotters::prelude::*;
use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "pqrst",
    version,
    about = "PQRST: single-lead ECG filtering and cardiac phase extraction"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the raw trace comes from: a WFDB record or newline-delimited samples.
#[derive(Args, Debug)]
struct SourceArgs {
    /// Directory holding `<record>.hea`, `<record>.dat` and `<record>.atr`
    #[arg(long, requires = "record")]
    wfdb_dir: Option<PathBuf>,
    /// Record id inside --wfdb-dir
    #[arg(long)]
    record: Option<String>,
    /// Newline-delimited samples (stdin when neither this nor --wfdb-dir is given)
    #[arg(long, conflicts_with = "wfdb_dir")]
    input: Option<PathBuf>,
    /// Sampling rate of --input / stdin samples
    #[arg(long, default_value_t = 250.0)]
    fs: f64,
}

#[derive(Args, Debug)]
struct TuningArgs {
    /// TOML pipeline configuration
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    lowcut_hz: Option<f64>,
    #[arg(long)]
    highcut_hz: Option<f64>,
    #[arg(long)]
    taps: Option<usize>,
    #[arg(long)]
    pairing: Option<Pairing>,
    /// Plot artifact length cap (seconds)
    #[arg(long)]
    plot_window_s: Option<f64>,
}

#[derive(Args, Debug)]
struct PeakArgs {
    #[arg(long, value_enum, default_value = "detector")]
    peaks: Peaks,
    /// Newline-delimited R-peak sample indices; overrides --peaks
    #[arg(long)]
    rpeaks: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Peaks {
    Detector,
    Annotations,
}

impl From<Peaks> for PeakSource {
    fn from(peaks: Peaks) -> Self {
        match peaks {
            Peaks::Detector => PeakSource::Detector,
            Peaks::Annotations => PeakSource::Annotations,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Pairing {
    PerBeat,
    WaveAligned,
}

impl From<Pairing> for PhasePairing {
    fn from(pairing: Pairing) -> Self {
        match pairing {
            Pairing::PerBeat => PhasePairing::PerBeat,
            Pairing::WaveAligned => PhasePairing::WaveAligned,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PhaseFormat {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Band-pass the trace and print the plot artifact (JSON array)
    Filter {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Print R-peak indices found in the filtered trace
    Rpeaks {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        #[command(flatten)]
        peaks: PeakArgs,
    },
    /// Print the PQ/QRS/ST phase intervals
    Phases {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        #[command(flatten)]
        peaks: PeakArgs,
        #[arg(long, value_enum, default_value = "json")]
        format: PhaseFormat,
    },
    /// Process a WFDB record and write ecg_plot<id>.json / ecg_phases<id>.json
    Process {
        #[arg(long)]
        wfdb_dir: PathBuf,
        #[arg(long)]
        record: String,
        #[arg(long, default_value = "outputs")]
        out: PathBuf,
        #[command(flatten)]
        tuning: TuningArgs,
        #[arg(long, value_enum, default_value = "detector")]
        peaks: Peaks,
    },
    /// Run one record through the request/response boundary and print the response
    Respond {
        #[arg(long)]
        wfdb_dir: PathBuf,
        #[arg(long)]
        record: String,
        #[command(flatten)]
        tuning: TuningArgs,
        #[arg(long, value_enum, default_value = "detector")]
        peaks: Peaks,
    },
    /// Render the plot artifact with its phase bands to a PNG
    Plot {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        #[command(flatten)]
        peaks: PeakArgs,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Filter { source, tuning } => cmd_filter(&source, &tuning)?,
        Commands::Rpeaks {
            source,
            tuning,
            peaks,
        } => cmd_rpeaks(&source, &tuning, &peaks)?,
        Commands::Phases {
            source,
            tuning,
            peaks,
            format,
        } => cmd_phases(&source, &tuning, &peaks, format)?,
        Commands::Process {
            wfdb_dir,
            record,
            out,
            tuning,
            peaks,
        } => cmd_process(&wfdb_dir, &record, &out, &tuning, peaks)?,
        Commands::Respond {
            wfdb_dir,
            record,
            tuning,
            peaks,
        } => cmd_respond(&wfdb_dir, &record, &tuning, peaks)?,
        Commands::Plot {
            source,
            tuning,
            peaks,
            out,
        } => cmd_plot(&source, &tuning, &peaks, &out)?,
    }
    Ok(())
}

/// Peaks read up front from a text file, for runs with externally detected
/// beats.
struct FilePeaks(Events);

impl FilePeaks {
    fn read(path: &Path) -> Result<Self> {
        let mut indices = text_io::read_peak_indices(path)?;
        if indices.windows(2).any(|w| w[0] > w[1]) {
            anyhow::bail!("R-peaks in {} are not ascending", path.display());
        }
        indices.dedup();
        Ok(Self(Events::from_indices(indices)))
    }
}

impl PeakDetector for FilePeaks {
    fn name(&self) -> &'static str {
        "file"
    }

    fn detect(&self, _ts: &TimeSeries) -> Result<Events> {
        Ok(self.0.clone())
    }
}

fn load_config(tuning: &TuningArgs) -> Result<PipelineConfig> {
    let mut cfg = PipelineConfig::load_or_default(tuning.config.as_deref())?;
    if let Some(low) = tuning.lowcut_hz {
        cfg.filter.low_hz = low;
    }
    if let Some(high) = tuning.highcut_hz {
        cfg.filter.high_hz = high;
    }
    if let Some(taps) = tuning.taps {
        cfg.filter.taps = taps;
    }
    if let Some(pairing) = tuning.pairing {
        cfg.pairing = pairing.into();
    }
    if let Some(window) = tuning.plot_window_s {
        cfg.plot_window_s = window;
    }
    Ok(cfg)
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn record_files(source: &SourceArgs) -> Result<Option<wfdb_io::RecordFiles>> {
    match (&source.wfdb_dir, &source.record) {
        (Some(dir), Some(record)) => Ok(Some(wfdb_io::RecordFiles::locate(dir, record)?)),
        _ => Ok(None),
    }
}

fn load_time_series(source: &SourceArgs) -> Result<TimeSeries> {
    if let Some(files) = record_files(source)? {
        return Ok(wfdb_io::load_record(&files)?);
    }
    let data = read_samples(source.input.as_deref())?;
    Ok(TimeSeries::new(source.fs, data))
}

fn detector_for(
    source: &SourceArgs,
    peaks: &PeakArgs,
    cfg: &PipelineConfig,
) -> Result<Box<dyn PeakDetector>> {
    if let Some(path) = &peaks.rpeaks {
        return Ok(Box::new(FilePeaks::read(path)?));
    }
    match peaks.peaks {
        Peaks::Detector => Ok(Box::new(EnvelopeDetector::new(cfg.detector))),
        Peaks::Annotations => {
            let files = record_files(source)?
                .context("--peaks annotations needs --wfdb-dir and --record")?;
            Ok(Box::new(AnnotationPeaks::new(files.annotations)))
        }
    }
}

fn run(
    source: &SourceArgs,
    tuning: &TuningArgs,
    peaks: &PeakArgs,
) -> Result<(PipelineConfig, PipelineOutput)> {
    let cfg = load_config(tuning)?;
    let ts = load_time_series(source)?;
    let detector = detector_for(source, peaks, &cfg)?;
    let output = run_pipeline(&ts, detector.as_ref(), &cfg)?;
    Ok((cfg, output))
}

fn cmd_filter(source: &SourceArgs, tuning: &TuningArgs) -> Result<()> {
    let cfg = load_config(tuning)?;
    let ts = load_time_series(source)?;
    ts.validate()?;
    let filtered = pqrst_lib::filter::bandpass_series(&ts, &cfg.filter)?;
    let artifacts = Artifacts::new(&filtered.data, filtered.fs, cfg.plot_window_s, Vec::new());
    println!("{}", artifacts.plot_json()?);
    Ok(())
}

fn cmd_rpeaks(source: &SourceArgs, tuning: &TuningArgs, peaks: &PeakArgs) -> Result<()> {
    let (_, output) = run(source, tuning, peaks)?;
    println!("{}", serde_json::to_string(&output.r_peaks)?);
    Ok(())
}

fn cmd_phases(
    source: &SourceArgs,
    tuning: &TuningArgs,
    peaks: &PeakArgs,
    format: PhaseFormat,
) -> Result<()> {
    let (cfg, output) = run(source, tuning, peaks)?;
    let artifacts = output.artifacts(&cfg);
    match format {
        PhaseFormat::Json => println!("{}", artifacts.phases_json()?),
        PhaseFormat::Csv => write_phases_csv(io::stdout().lock(), &artifacts.phases)?,
    }
    Ok(())
}

fn write_phases_csv<W: Write>(out: W, phases: &[PhaseInterval]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    if phases.is_empty() {
        writer.write_record(["entry", "duration", "phase"])?;
    }
    for interval in phases {
        writer.serialize(interval)?;
    }
    writer.flush()?;
    Ok(())
}

fn cmd_process(
    wfdb_dir: &Path,
    record: &str,
    out: &Path,
    tuning: &TuningArgs,
    peaks: Peaks,
) -> Result<()> {
    let cfg = load_config(tuning)?;
    let files = wfdb_io::RecordFiles::locate(wfdb_dir, record)?;
    let detector: Box<dyn PeakDetector> = match peaks {
        Peaks::Detector => Box::new(EnvelopeDetector::new(cfg.detector)),
        Peaks::Annotations => Box::new(AnnotationPeaks::new(files.annotations.clone())),
    };
    let output = pqrst_lib::pipeline::run_record(&files, detector.as_ref(), &cfg)?;
    let paths = output.artifacts(&cfg).write(out, record)?;
    info!(
        "done: {}, {}",
        paths.plot.display(),
        paths.phases.display()
    );
    Ok(())
}

fn cmd_respond(wfdb_dir: &Path, record: &str, tuning: &TuningArgs, peaks: Peaks) -> Result<()> {
    let cfg = load_config(tuning)?;
    let upload = RecordUpload::from_dir(wfdb_dir, record)
        .with_context(|| format!("reading record {} from {}", record, wfdb_dir.display()))?;
    match boundary::respond(&upload, peaks.into(), &cfg) {
        Ok(response) => println!("{}", serde_json::to_string(&response)?),
        Err(err) => {
            println!("{}", serde_json::to_string(&err)?);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn cmd_plot(source: &SourceArgs, tuning: &TuningArgs, peaks: &PeakArgs, out: &Path) -> Result<()> {
    let (cfg, output) = run(source, tuning, peaks)?;
    let title = source.record.clone().unwrap_or_else(|| "ECG".into());
    let fig = figure_from_artifacts(&title, &output.artifacts(&cfg), output.fs, 4096);
    draw_plotters_figure(out, &fig)?;
    Ok(())
}

/// Widen a degenerate (flat) axis range so plotters can scale it.
fn padded(range: [f64; 2]) -> (f64, f64) {
    let [lo, hi] = range;
    if hi - lo > f64::EPSILON {
        (lo, hi)
    } else {
        (lo - 1.0, hi + 1.0)
    }
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let (x, y) = fig.line_bounds().unwrap_or(([0.0, 1.0], [-1.0, 1.0]));
    let (x_min, x_max) = padded(x);
    let (y_min, y_max) = padded(y);
    let backend = BitMapBackend::new(path, (1200, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    // bands first so the trace stays on top
    for series in &fig.series {
        if let Series::Band(band) = series {
            let (r, g, b) = band.color.rgb();
            chart.draw_series(std::iter::once(Rectangle::new(
                [(band.start, y_min), (band.end, y_max)],
                RGBColor(r, g, b).mix(0.2).filled(),
            )))?;
        }
    }
    for series in &fig.series {
        if let Series::Line(line) = series {
            let (r, g, b) = line.style.color.rgb();
            chart.draw_series(LineSeries::new(
                line.points.iter().map(|p| (p[0], p[1])),
                &RGBColor(r, g, b),
            ))?;
        }
    }
    root.present()?;
    Ok(())
}
