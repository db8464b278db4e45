use crate::config::ValidationConfig;
use crate::error::{HrvError, Result};
use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Validated beat-to-beat intervals (seconds) of one session, in recording order.
///
/// Construction is the only place intervals are checked; everything derived
/// from a series is a pure function of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalSeries {
    intervals: Vec<f64>,
    start_time: Option<NaiveDateTime>,
}

/// Bookkeeping for intervals dropped while building an [`IntervalSeries`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total: usize,
    pub accepted: usize,
    pub excluded: usize,
    /// Positions (in the raw input) of the excluded samples.
    pub excluded_indices: Vec<usize>,
}

impl IntervalSeries {
    /// Strict constructor over intervals already in seconds.
    pub fn new(intervals: Vec<f64>, start_time: Option<NaiveDateTime>) -> Result<Self> {
        if let Some((index, &value)) = intervals
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(HrvError::InvalidInterval {
                index,
                value_ms: value * 1000.0,
            });
        }
        if intervals.len() < 2 {
            return Err(HrvError::InsufficientData {
                context: "interval series",
                needed: 2,
                found: intervals.len(),
            });
        }
        Ok(Self {
            intervals,
            start_time,
        })
    }

    /// Convert raw millisecond gaps to seconds, dropping implausible values.
    ///
    /// Order of the surviving samples is preserved. Fails only when fewer than
    /// two intervals survive.
    pub fn from_millis(
        raw_ms: &[f64],
        start_time: Option<NaiveDateTime>,
        window: &ValidationConfig,
    ) -> Result<(Self, ValidationReport)> {
        let mut intervals = Vec::with_capacity(raw_ms.len());
        let mut excluded_indices = Vec::new();
        for (idx, &ms) in raw_ms.iter().enumerate() {
            let seconds = ms / 1000.0;
            if window.accepts(seconds) {
                intervals.push(seconds);
            } else {
                debug!("excluding interval #{idx}: {ms} ms");
                excluded_indices.push(idx);
            }
        }
        let report = ValidationReport {
            total: raw_ms.len(),
            accepted: intervals.len(),
            excluded: excluded_indices.len(),
            excluded_indices,
        };
        if report.excluded > 0 {
            warn!(
                "excluded {} of {} intervals outside [{}, {}] s",
                report.excluded, report.total, window.min_interval_s, window.max_interval_s
            );
        }
        if intervals.len() < 2 {
            return Err(HrvError::InsufficientData {
                context: "valid intervals",
                needed: 2,
                found: intervals.len(),
            });
        }
        Ok((
            Self {
                intervals,
                start_time,
            },
            report,
        ))
    }

    pub fn intervals(&self) -> &[f64] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start_time
    }

    /// Total recorded time covered by the intervals (seconds).
    pub fn duration_s(&self) -> f64 {
        self.intervals.iter().sum()
    }

    /// Beat occurrence axis: `t[0] = 0`, `t[i] = t[i-1] + intervals[i-1]`.
    pub fn beat_times(&self) -> Vec<f64> {
        let mut times = Vec::with_capacity(self.intervals.len());
        let mut acc = 0.0;
        for interval in &self.intervals {
            times.push(acc);
            acc += interval;
        }
        times
    }

    /// `d[i] = intervals[i+1] - intervals[i]`
    pub fn successive_differences(&self) -> Vec<f64> {
        self.intervals.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_constructor_rejects_non_positive() {
        let err = IntervalSeries::new(vec![0.8, 0.0, 0.9], None).unwrap_err();
        assert!(matches!(err, HrvError::InvalidInterval { index: 1, .. }));
    }

    #[test]
    fn strict_constructor_needs_two_intervals() {
        let err = IntervalSeries::new(vec![0.8], None).unwrap_err();
        assert!(matches!(
            err,
            HrvError::InsufficientData { needed: 2, found: 1, .. }
        ));
    }

    #[test]
    fn from_millis_converts_and_reports_exclusions() {
        let raw = [800.0, 5000.0, 820.0, -10.0, 790.0, 100.0];
        let (series, report) =
            IntervalSeries::from_millis(&raw, None, &ValidationConfig::default()).unwrap();
        assert_eq!(series.intervals(), &[0.8, 0.82, 0.79]);
        assert_eq!(report.total, 6);
        assert_eq!(report.accepted, 3);
        assert_eq!(report.excluded, 3);
        assert_eq!(report.excluded_indices, vec![1, 3, 5]);
    }

    #[test]
    fn from_millis_escalates_when_everything_is_excluded() {
        let raw = [5000.0, 6000.0, 10.0];
        let err =
            IntervalSeries::from_millis(&raw, None, &ValidationConfig::default()).unwrap_err();
        assert!(matches!(err, HrvError::InsufficientData { found: 0, .. }));
    }

    #[test]
    fn beat_times_start_at_zero() {
        let series = IntervalSeries::new(vec![0.8, 0.9, 1.0], None).unwrap();
        let times = series.beat_times();
        assert_eq!(times.len(), 3);
        assert_eq!(times[0], 0.0);
        assert!((times[1] - 0.8).abs() < 1e-12);
        assert!((times[2] - 1.7).abs() < 1e-12);
        assert!((series.duration_s() - 2.7).abs() < 1e-12);
    }

    #[test]
    fn successive_differences_keep_order() {
        let series = IntervalSeries::new(vec![1.0, 0.5, 0.75], None).unwrap();
        assert_eq!(series.successive_differences(), vec![-0.5, 0.25]);
    }
}
