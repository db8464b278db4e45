//! Statistics over a date-ordered HRV log.
//!
//! Every function here is a pure transformation of a slice of results; none of
//! them keeps state between calls.

use crate::metrics::{mean, population_std};
use crate::session::HrvSessionResult;
use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics that take part in the correlation matrix, in column order.
pub const CORRELATION_METRICS: [&str; 4] = ["sdnn", "rmssd", "lf_hf_ratio", "mean_hr"];

/// Metrics combined into the variability index.
pub const VARIABILITY_METRICS: [&str; 3] = ["sdnn", "rmssd", "lf_hf_ratio"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Coefficient of variation, `std / mean`.
    pub cv: Option<f64>,
}

/// Summary of the finite values; `None` if there are none.
pub fn summary(values: &[f64]) -> Option<Summary> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let m = mean(&finite)?;
    let std = population_std(&finite)?;
    Some(Summary {
        count: finite.len(),
        mean: m,
        std,
        min: finite.iter().copied().fold(f64::INFINITY, f64::min),
        max: finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        cv: crate::metrics::ratio(std, m),
    })
}

/// Column of a named metric; undefined cells stay `None`.
pub fn metric_column(log: &[HrvSessionResult], metric: &str) -> Vec<Option<f64>> {
    log.iter().map(|r| r.metric(metric)).collect()
}

/// Trailing mean over `window` values, `None` until the window is full or when
/// it holds an undefined value.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice: Option<Vec<f64>> = values[i + 1 - window..=i].iter().copied().collect();
            slice.and_then(|s| mean(&s))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// `YYYY-Www` for weeks, `YYYY-MM` for months.
    pub period: String,
    pub sessions: usize,
    pub sdnn: Option<Summary>,
    pub rmssd: Option<Summary>,
    pub lf_hf_ratio: Option<Summary>,
}

pub fn weekly_summaries(log: &[HrvSessionResult]) -> Vec<PeriodSummary> {
    grouped_summaries(log, |r| {
        let week = r.date().iso_week();
        format!("{}-W{:02}", week.year(), week.week())
    })
}

pub fn monthly_summaries(log: &[HrvSessionResult]) -> Vec<PeriodSummary> {
    grouped_summaries(log, |r| format!("{}-{:02}", r.date().year(), r.date().month()))
}

fn grouped_summaries(
    log: &[HrvSessionResult],
    key: impl Fn(&HrvSessionResult) -> String,
) -> Vec<PeriodSummary> {
    let mut groups: BTreeMap<String, Vec<&HrvSessionResult>> = BTreeMap::new();
    for r in log {
        groups.entry(key(r)).or_default().push(r);
    }
    groups
        .into_iter()
        .map(|(period, rows)| {
            let column = |metric: &str| -> Vec<f64> {
                rows.iter().filter_map(|r| r.metric(metric)).collect()
            };
            PeriodSummary {
                period,
                sessions: rows.len(),
                sdnn: summary(&column("sdnn")),
                rmssd: summary(&column("rmssd")),
                lf_hf_ratio: summary(&column("lf_hf_ratio")),
            }
        })
        .collect()
}

/// Pearson correlation over the rows where both values are defined.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx.sqrt() * syy.sqrt()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub metrics: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

pub fn correlation_matrix(log: &[HrvSessionResult]) -> CorrelationMatrix {
    let columns: Vec<Vec<Option<f64>>> = CORRELATION_METRICS
        .iter()
        .map(|m| metric_column(log, m))
        .collect();
    let values = columns
        .iter()
        .map(|a| columns.iter().map(|b| pearson(a, b)).collect())
        .collect();
    CorrelationMatrix {
        metrics: CORRELATION_METRICS.iter().map(|m| m.to_string()).collect(),
        values,
    }
}

/// Per-session mean of the z-scores of SDNN, RMSSD and LF/HF.
///
/// Columns without spread contribute zeros; sessions with an undefined metric
/// get `None`.
pub fn variability_index(log: &[HrvSessionResult]) -> Vec<Option<f64>> {
    let scaled: Vec<Vec<Option<f64>>> = VARIABILITY_METRICS
        .iter()
        .map(|m| standardize(&metric_column(log, m)))
        .collect();
    (0..log.len())
        .map(|i| {
            let row: Option<Vec<f64>> = scaled.iter().map(|col| col[i]).collect();
            row.and_then(|r| mean(&r))
        })
        .collect()
}

fn standardize(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let defined: Vec<f64> = column.iter().flatten().copied().collect();
    let (Some(m), Some(s)) = (mean(&defined), population_std(&defined)) else {
        return vec![None; column.len()];
    };
    column
        .iter()
        .map(|v| v.map(|x| if s > 0.0 { (x - m) / s } else { 0.0 }))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub period: usize,
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<Option<f64>>,
}

/// Additive decomposition: centred moving-average trend, per-phase mean
/// seasonal component (zero mean over one period) and residual.
///
/// Needs at least two full periods; edges without a full trend window stay
/// `None`.
pub fn seasonal_decompose(values: &[f64], period: usize) -> Option<Decomposition> {
    let n = values.len();
    if period < 2 || n < 2 * period {
        return None;
    }
    let trend = centred_moving_average(values, period);

    let mut phase_sum = vec![0.0; period];
    let mut phase_count = vec![0usize; period];
    for (i, (v, t)) in values.iter().zip(&trend).enumerate() {
        if let Some(t) = t {
            phase_sum[i % period] += v - t;
            phase_count[i % period] += 1;
        }
    }
    let phase_mean: Vec<f64> = phase_sum
        .iter()
        .zip(&phase_count)
        .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
        .collect();
    let offset = phase_mean.iter().sum::<f64>() / period as f64;
    let seasonal: Vec<f64> = (0..n).map(|i| phase_mean[i % period] - offset).collect();
    let residual = values
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((v, t), s)| t.map(|t| v - t - s))
        .collect();
    Some(Decomposition {
        period,
        trend,
        seasonal,
        residual,
    })
}

/// Centred moving average; even periods use the 2×MA weights
/// (half weight on both ends).
fn centred_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = period / 2;
    let weights: Vec<f64> = if period % 2 == 1 {
        vec![1.0 / period as f64; period]
    } else {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] /= 2.0;
        w[period] /= 2.0;
        w
    };
    (0..n)
        .map(|i| {
            if i < half || i + half >= n {
                return None;
            }
            let start = i - half;
            Some(
                weights
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * values[start + k])
                    .sum(),
            )
        })
        .collect()
}

/// Mean SDNN per weekday, Monday first; days without sessions are `None`.
pub fn weekday_profile(log: &[HrvSessionResult]) -> Vec<(Weekday, Option<f64>)> {
    let mut buckets: [Vec<f64>; 7] = Default::default();
    for r in log {
        buckets[r.date().weekday().num_days_from_monday() as usize].push(r.time.sdnn);
    }
    let days = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    days.into_iter()
        .zip(buckets.iter())
        .map(|(day, values)| (day, mean(values)))
        .collect()
}

/// LF/HF divided by SDNN per session.
pub fn stress_index(log: &[HrvSessionResult]) -> Vec<Option<f64>> {
    log.iter()
        .map(|r| {
            r.lf_hf_ratio()
                .and_then(|ratio| crate::metrics::ratio(ratio, r.time.sdnn))
        })
        .collect()
}

/// Everything above bundled for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogReport {
    pub sessions: usize,
    pub sdnn: Option<Summary>,
    pub rmssd: Option<Summary>,
    pub weekly: Vec<PeriodSummary>,
    pub monthly: Vec<PeriodSummary>,
    pub correlations: CorrelationMatrix,
    pub variability_index: Option<Summary>,
    pub rmssd_rolling_7: Vec<Option<f64>>,
    pub sdnn_decomposition: Option<Decomposition>,
    pub weekday_sdnn: Vec<(Weekday, Option<f64>)>,
    pub stress_index: Vec<Option<f64>>,
}

pub fn log_report(log: &[HrvSessionResult]) -> LogReport {
    let sdnn: Vec<f64> = log.iter().map(|r| r.time.sdnn).collect();
    let rmssd: Vec<f64> = log.iter().map(|r| r.time.rmssd).collect();
    let index: Vec<f64> = variability_index(log).into_iter().flatten().collect();
    LogReport {
        sessions: log.len(),
        sdnn: summary(&sdnn),
        rmssd: summary(&rmssd),
        weekly: weekly_summaries(log),
        monthly: monthly_summaries(log),
        correlations: correlation_matrix(log),
        variability_index: summary(&index),
        rmssd_rolling_7: rolling_mean(&metric_column(log, "rmssd"), 7),
        sdnn_decomposition: seasonal_decompose(&sdnn, 7),
        weekday_sdnn: weekday_profile(log),
        stress_index: stress_index(log),
    }
}
