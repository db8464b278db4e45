use crate::metrics::frequency::{Band, HF, LF, VLF};
use crate::metrics::spectral::Psd;
use crate::session::HrvSessionResult;
use crate::signal::IntervalSeries;
use crate::stats::{metric_column, rolling_mean};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub radius: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Scatter(ScatterSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(s) => &s.points,
            Series::Scatter(s) => &s.points,
        }
    }
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
            x: Axis::default(),
            y: Axis::default(),
            series: Vec::new(),
        }
    }

    pub fn with_labels(mut self, x: &str, y: &str) -> Self {
        self.x.label = Some(x.into());
        self.y.label = Some(y.into());
        self
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Bounding box `(x_min, x_max, y_min, y_max)` over every finite point.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut pts = self
            .series
            .iter()
            .flat_map(|s| s.points().iter())
            .filter(|p| p[0].is_finite() && p[1].is_finite());
        let first = pts.next()?;
        Some(pts.fold(
            (first[0], first[0], first[1], first[1]),
            |(x0, x1, y0, y1), p| (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1])),
        ))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Interval tachogram: interval (ms) against elapsed beat time (s).
pub fn figure_from_intervals(series: &IntervalSeries, max_points: usize) -> Figure {
    let points: Vec<[f64; 2]> = series
        .beat_times()
        .iter()
        .zip(series.intervals())
        .map(|(t, rr)| [*t, rr * 1000.0])
        .collect();
    let mut fig =
        Figure::new(Some("Beat intervals".into())).with_labels("time (s)", "interval (ms)");
    fig.add_series(Series::Line(LineSeries {
        name: "RR".into(),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 2.0,
            dash: None,
            color: Color(0xFF0077),
        },
    }));
    fig
}

/// Spectrum up to the top of the HF band, with dashed band edges.
pub fn figure_from_psd(psd: &Psd, max_points: usize) -> Figure {
    let points: Vec<[f64; 2]> = psd.points().into_iter().filter(|p| p[0] <= HF.high).collect();
    let peak = points.iter().map(|p| p[1]).fold(0.0_f64, f64::max);
    let mut fig = Figure::new(Some("Power spectral density".into()))
        .with_labels("frequency (Hz)", "power (ms²/Hz)");
    fig.add_series(Series::Line(LineSeries {
        name: "PSD".into(),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 1.6,
            dash: None,
            color: Color(0x1F77B4),
        },
    }));
    for (name, band) in [("VLF", VLF), ("LF", LF), ("HF", HF)] {
        fig.add_series(band_edge(name, band, peak));
    }
    fig
}

fn band_edge(name: &str, band: Band, height: f64) -> Series {
    Series::Line(LineSeries {
        name: format!("{name} lower edge"),
        points: vec![[band.low, 0.0], [band.low, height]],
        style: Style {
            width: 1.0,
            dash: Some([4.0, 4.0]),
            color: Color(0x888888),
        },
    })
}

/// One metric across the log, x in days since the first session, with an
/// optional trailing mean.
pub fn figure_from_log(log: &[HrvSessionResult], metric: &str, rolling_window: usize) -> Figure {
    let mut fig = Figure::new(Some(format!("{metric} over time")));
    let Some(origin) = log.first().map(HrvSessionResult::date) else {
        return fig;
    };
    fig = fig.with_labels(&format!("days since {}", origin.date()), metric);
    let days: Vec<f64> = log
        .iter()
        .map(|r| (r.date() - origin).num_seconds() as f64 / 86_400.0)
        .collect();
    let values = metric_column(log, metric);
    let paired = |vals: &[Option<f64>]| -> Vec<[f64; 2]> {
        days.iter()
            .zip(vals)
            .filter_map(|(d, v)| v.map(|v| [*d, v]))
            .collect()
    };
    fig.add_series(Series::Scatter(ScatterSeries {
        name: metric.into(),
        points: paired(&values),
        radius: 3.0,
        color: Color(0x2CA02C),
    }));
    if rolling_window > 1 {
        fig.add_series(Series::Line(LineSeries {
            name: format!("{rolling_window}-session mean"),
            points: paired(&rolling_mean(&values, rolling_window)),
            style: Style {
                width: 2.0,
                dash: None,
                color: Color(0xD62728),
            },
        }));
    }
    fig
}
