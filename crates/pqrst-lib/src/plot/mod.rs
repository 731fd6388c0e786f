use crate::output::Artifacts;
use crate::phases::Phase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Shaded time band, e.g. one QRS complex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Band(Band),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Bounding box of every line point, `None` for a figure without lines.
    pub fn line_bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let mut points = self.series.iter().flat_map(|s| match s {
            Series::Line(line) => line.points.as_slice(),
            Series::Band(_) => &[][..],
        });
        let first = points.next()?;
        let init = ([first[0], first[0]], [first[1], first[1]]);
        Some(points.fold(init, |(x, y), p| {
            ([x[0].min(p[0]), x[1].max(p[0])], [y[0].min(p[1]), y[1].max(p[1])])
        }))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    (0..max_points)
        .map(|i| (i as f64 * bucket_size).floor() as usize)
        .take_while(|&start| start < points.len())
        .map(|start| points[start])
        .collect()
}

pub fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Pq => Color(0x4C9AFF),
        Phase::Qrs => Color(0xFF5630),
        Phase::St => Color(0x36B37E),
    }
}

/// Plot trace over time with every phase interval that starts inside it.
pub fn figure_from_artifacts(
    title: &str,
    artifacts: &Artifacts,
    fs: f64,
    max_points: usize,
) -> Figure {
    let dt = 1.0 / fs.max(f64::MIN_POSITIVE);
    let points: Vec<[f64; 2]> = artifacts
        .plot
        .iter()
        .enumerate()
        .map(|(i, value)| [i as f64 * dt, *value])
        .collect();
    let visible_until = artifacts.plot.len() as f64 * dt;

    let mut fig = Figure::new(Some(title.into()));
    fig.x.label = Some("time (s)".into());
    fig.y.label = Some("amplitude".into());
    for interval in artifacts
        .phases
        .iter()
        .filter(|p| p.entry < visible_until)
    {
        fig.add_series(Series::Band(Band {
            label: interval.phase.label().into(),
            start: interval.entry,
            end: (interval.entry + interval.duration).min(visible_until),
            color: phase_color(interval.phase),
        }));
    }
    fig.add_series(Series::Line(LineSeries {
        name: "filtered".into(),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 1.4,
            color: Color(0x172B4D),
        },
    }));
    fig
}
