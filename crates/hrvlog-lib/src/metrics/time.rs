//! Time-domain and Poincaré statistics over an [`IntervalSeries`].
//!
//! Durations are reported in milliseconds, heart rate in beats per minute and
//! the pNNx values as percentages.

use super::{mean, population_std, ratio};
use crate::config::Sd2Method;
use crate::signal::IntervalSeries;
use serde::{Deserialize, Serialize};

const NN50_THRESHOLD_S: f64 = 0.050;
const NN20_THRESHOLD_S: f64 = 0.020;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "TimeDomainRecord", from = "TimeDomainRecord")]
pub struct TimeDomainMetrics {
    pub n: usize,
    pub mean_rr: f64,
    pub mean_hr: f64,
    pub sdnn: f64,
    pub rmssd: f64,
    pub sdsd: f64,
    pub nn50: usize,
    pub pnn50: f64,
    pub nn20: usize,
    pub pnn20: f64,
    pub sd1: f64,
    pub sd2: f64,
}

impl TimeDomainMetrics {
    /// `sd2 / sd1`; undefined when either axis of the Poincaré ellipse is zero.
    ///
    /// A zero `sd2` with non-zero `sd1` only arises from clamping
    /// `2·sdnn² − sd1²` on short alternating series, so no ratio is reported.
    pub fn sd2_sd1_ratio(&self) -> Option<f64> {
        if self.sd2 > 0.0 {
            ratio(self.sd2, self.sd1)
        } else {
            None
        }
    }

    pub fn ln_rmssd(&self) -> Option<f64> {
        if self.rmssd > 0.0 {
            Some(self.rmssd.ln())
        } else {
            None
        }
    }
}

/// Serialized shape: the derived values ride along for readers, and are
/// dropped again on the way in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct TimeDomainRecord {
    n: usize,
    mean_rr: f64,
    mean_hr: f64,
    sdnn: f64,
    rmssd: f64,
    sdsd: f64,
    nn50: usize,
    pnn50: f64,
    nn20: usize,
    pnn20: f64,
    sd1: f64,
    sd2: f64,
    #[serde(default)]
    sd2_sd1_ratio: Option<f64>,
    #[serde(default)]
    ln_rmssd: Option<f64>,
}

impl From<TimeDomainMetrics> for TimeDomainRecord {
    fn from(m: TimeDomainMetrics) -> Self {
        Self {
            n: m.n,
            mean_rr: m.mean_rr,
            mean_hr: m.mean_hr,
            sdnn: m.sdnn,
            rmssd: m.rmssd,
            sdsd: m.sdsd,
            nn50: m.nn50,
            pnn50: m.pnn50,
            nn20: m.nn20,
            pnn20: m.pnn20,
            sd1: m.sd1,
            sd2: m.sd2,
            sd2_sd1_ratio: m.sd2_sd1_ratio(),
            ln_rmssd: m.ln_rmssd(),
        }
    }
}

impl From<TimeDomainRecord> for TimeDomainMetrics {
    fn from(r: TimeDomainRecord) -> Self {
        Self {
            n: r.n,
            mean_rr: r.mean_rr,
            mean_hr: r.mean_hr,
            sdnn: r.sdnn,
            rmssd: r.rmssd,
            sdsd: r.sdsd,
            nn50: r.nn50,
            pnn50: r.pnn50,
            nn20: r.nn20,
            pnn20: r.pnn20,
            sd1: r.sd1,
            sd2: r.sd2,
        }
    }
}

pub fn time_domain(series: &IntervalSeries, sd2_method: Sd2Method) -> TimeDomainMetrics {
    let rr = series.intervals();
    let n = rr.len();
    // An IntervalSeries always holds at least two intervals.
    let mean_rr = mean(rr).unwrap_or(0.0);
    let sdnn = population_std(rr).unwrap_or(0.0);

    let diffs = series.successive_differences();
    let rmssd = mean(&diffs.iter().map(|d| d * d).collect::<Vec<_>>())
        .unwrap_or(0.0)
        .sqrt();
    let sdsd = population_std(&diffs).unwrap_or(0.0);
    let nn50 = diffs.iter().filter(|d| d.abs() > NN50_THRESHOLD_S).count();
    let nn20 = diffs.iter().filter(|d| d.abs() > NN20_THRESHOLD_S).count();
    let pairs = diffs.len().max(1) as f64;

    let sd1 = sdsd / std::f64::consts::SQRT_2;
    let sd2 = match sd2_method {
        Sd2Method::Poincare => (2.0 * sdnn * sdnn - sd1 * sd1).max(0.0).sqrt(),
        Sd2Method::Sdnn => sdnn,
    };

    TimeDomainMetrics {
        n,
        mean_rr: mean_rr * 1000.0,
        mean_hr: if mean_rr > 0.0 { 60.0 / mean_rr } else { 0.0 },
        sdnn: sdnn * 1000.0,
        rmssd: rmssd * 1000.0,
        sdsd: sdsd * 1000.0,
        nn50,
        pnn50: 100.0 * nn50 as f64 / pairs,
        nn20,
        pnn20: 100.0 * nn20 as f64 / pairs,
        sd1: sd1 * 1000.0,
        sd2: sd2 * 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn series(values: &[f64]) -> IntervalSeries {
        IntervalSeries::new(values.to_vec(), None).unwrap()
    }

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    #[test]
    fn five_beat_scenario() {
        let m = time_domain(&series(&[0.8, 0.82, 0.78, 0.81, 0.79]), Sd2Method::Poincare);
        assert_eq!(m.n, 5);
        assert_close(m.mean_rr, 800.0, 1e-9);
        assert_close(m.mean_hr, 75.0, 1e-9);
        assert!(m.rmssd > 0.0);
        assert!(m.sdnn > 0.0);
        assert_eq!(m.nn50, 0);
        assert_eq!(m.pnn50, 0.0);
        // diffs: +20, -40, +30, -20 ms
        assert_close(m.rmssd, (3300.0f64 / 4.0).sqrt(), 1e-9);
        assert_close(m.sdnn, 200.0f64.sqrt(), 1e-9);
    }

    #[test]
    fn pnn20_uses_the_twenty_ms_threshold() {
        let m = time_domain(&series(&[0.8, 0.83, 0.8, 0.81]), Sd2Method::Poincare);
        assert_eq!(m.nn20, 2);
        assert_eq!(m.nn50, 0);
        assert_close(m.pnn20, 200.0 / 3.0, 1e-9);
    }

    #[test]
    fn constant_series_has_no_variability() {
        let m = time_domain(&series(&[0.9; 6]), Sd2Method::Poincare);
        assert_eq!(m.sdnn, 0.0);
        assert_eq!(m.rmssd, 0.0);
        assert_eq!(m.sd1, 0.0);
        assert_eq!(m.sd2_sd1_ratio(), None);
        assert_eq!(m.ln_rmssd(), None);
        assert_close(m.mean_hr, 60.0 / 0.9, 1e-9);
    }

    #[test]
    fn mean_hr_is_sixty_over_mean_rr() {
        let m = time_domain(&series(&[0.6, 1.1, 0.75, 0.95]), Sd2Method::Poincare);
        assert_close(m.mean_hr, 60.0 / (m.mean_rr / 1000.0), 1e-9);
    }

    #[test]
    fn pnn50_counts_large_jumps_as_percentage() {
        let m = time_domain(&series(&[0.8, 0.9, 0.8, 0.81]), Sd2Method::Poincare);
        assert_eq!(m.nn50, 2);
        assert_close(m.pnn50, 200.0 / 3.0, 1e-9);
    }

    #[test]
    fn pnn50_stays_in_percent_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let len = rng.gen_range(2..60);
            let values: Vec<f64> = (0..len).map(|_| rng.gen_range(0.4..1.2)).collect();
            let m = time_domain(&series(&values), Sd2Method::Poincare);
            assert!((0.0..=100.0).contains(&m.pnn50));
            assert!((0.0..=100.0).contains(&m.pnn20));
            assert!(m.pnn20 >= m.pnn50);
        }
    }

    #[test]
    fn sd1_is_std_of_differences_over_root_two() {
        let values = [0.82, 0.78, 0.80, 0.79, 0.83, 0.77, 0.84, 0.88, 0.86, 0.81];
        let m = time_domain(&series(&values), Sd2Method::Poincare);
        assert_close(m.sd1, m.sdsd / 2f64.sqrt(), 1e-12);
        assert_close(
            m.sd2,
            (2.0 * m.sdnn * m.sdnn - m.sd1 * m.sd1).sqrt(),
            1e-9,
        );
    }

    #[test]
    fn sdnn_shortcut_reports_sdnn_as_sd2() {
        let values = [0.82, 0.78, 0.80, 0.79, 0.83];
        let m = time_domain(&series(&values), Sd2Method::Sdnn);
        assert_eq!(m.sd2, m.sdnn);
        assert_close(m.sd2_sd1_ratio().unwrap(), m.sdnn / m.sd1, 1e-12);
    }

    #[test]
    fn serialized_ratio_is_recomputed_on_read() {
        let values = [0.82, 0.78, 0.80, 0.79, 0.83, 0.77, 0.84, 0.88, 0.86, 0.81];
        let m = time_domain(&series(&values), Sd2Method::Poincare);
        let mut value = serde_json::to_value(m).unwrap();
        assert!(value["sd2_sd1_ratio"].as_f64().is_some());
        value["sd2_sd1_ratio"] = serde_json::json!(123.0);
        let back: TimeDomainMetrics = serde_json::from_value(value).unwrap();
        assert_close(back.sd2_sd1_ratio().unwrap(), m.sd2 / m.sd1, 1e-12);
    }

    #[test]
    fn clamped_sd2_leaves_the_ratio_undefined() {
        // deviations -5, +15, -15, +5 ms; successive differences +20, -30, +20 ms
        let m = time_domain(&series(&[0.8, 0.82, 0.79, 0.81]), Sd2Method::Poincare);
        assert!(m.sd1 > 0.0);
        assert_eq!(m.sd2, 0.0);
        assert_eq!(m.sd2_sd1_ratio(), None);
        let value = serde_json::to_value(m).unwrap();
        assert!(value["sd2_sd1_ratio"].is_null());
    }
}
