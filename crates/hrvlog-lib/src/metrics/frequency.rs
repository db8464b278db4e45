use super::ratio;
use super::spectral::Psd;
use crate::config::Integration;
use serde::{Deserialize, Serialize};

/// Frequency band, lower bound inclusive and upper bound exclusive (Hz).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, freq: f64) -> bool {
        freq >= self.low && freq < self.high
    }
}

pub const VLF: Band = Band::new(0.0033, 0.04);
pub const LF: Band = Band::new(0.04, 0.15);
pub const HF: Band = Band::new(0.15, 0.4);

/// Band powers (ms²) and the quantities derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "FrequencyDomainRecord", from = "FrequencyDomainRecord")]
pub struct FrequencyDomainMetrics {
    pub vlf: f64,
    pub lf: f64,
    pub hf: f64,
    pub peak_lf_hz: Option<f64>,
    pub peak_hf_hz: Option<f64>,
}

impl FrequencyDomainMetrics {
    pub fn total_power(&self) -> f64 {
        self.vlf + self.lf + self.hf
    }

    pub fn lf_hf_ratio(&self) -> Option<f64> {
        ratio(self.lf, self.hf)
    }

    /// LF share of LF + HF; VLF is left out by convention.
    pub fn lf_nu(&self) -> Option<f64> {
        ratio(self.lf, self.lf + self.hf)
    }

    pub fn hf_nu(&self) -> Option<f64> {
        ratio(self.hf, self.lf + self.hf)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct FrequencyDomainRecord {
    vlf: f64,
    lf: f64,
    hf: f64,
    #[serde(default)]
    total_power: f64,
    #[serde(default)]
    lf_hf_ratio: Option<f64>,
    #[serde(default)]
    lf_nu: Option<f64>,
    #[serde(default)]
    hf_nu: Option<f64>,
    #[serde(default)]
    peak_lf_hz: Option<f64>,
    #[serde(default)]
    peak_hf_hz: Option<f64>,
}

impl From<FrequencyDomainMetrics> for FrequencyDomainRecord {
    fn from(m: FrequencyDomainMetrics) -> Self {
        Self {
            vlf: m.vlf,
            lf: m.lf,
            hf: m.hf,
            total_power: m.total_power(),
            lf_hf_ratio: m.lf_hf_ratio(),
            lf_nu: m.lf_nu(),
            hf_nu: m.hf_nu(),
            peak_lf_hz: m.peak_lf_hz,
            peak_hf_hz: m.peak_hf_hz,
        }
    }
}

impl From<FrequencyDomainRecord> for FrequencyDomainMetrics {
    fn from(r: FrequencyDomainRecord) -> Self {
        Self {
            vlf: r.vlf,
            lf: r.lf,
            hf: r.hf,
            peak_lf_hz: r.peak_lf_hz,
            peak_hf_hz: r.peak_hf_hz,
        }
    }
}

pub fn frequency_domain(psd: &Psd, method: Integration) -> FrequencyDomainMetrics {
    FrequencyDomainMetrics {
        vlf: band_power(&psd.freqs, &psd.power, VLF, method),
        lf: band_power(&psd.freqs, &psd.power, LF, method),
        hf: band_power(&psd.freqs, &psd.power, HF, method),
        peak_lf_hz: band_peak(&psd.freqs, &psd.power, LF),
        peak_hf_hz: band_peak(&psd.freqs, &psd.power, HF),
    }
}

/// Integrate the PSD over the bins that fall inside `band`.
///
/// Bins are paired by index and sorted by frequency before integration, so
/// the caller's bin order does not matter.
pub fn band_power(freqs: &[f64], power: &[f64], band: Band, method: Integration) -> f64 {
    let mut points = select(freqs, power, band);
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    match method {
        Integration::Trapezoid => trapezoid(&points),
        Integration::Simpson => simpson(&points),
    }
}

fn band_peak(freqs: &[f64], power: &[f64], band: Band) -> Option<f64> {
    select(freqs, power, band)
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(f, _)| f)
}

fn select(freqs: &[f64], power: &[f64], band: Band) -> Vec<(f64, f64)> {
    freqs
        .iter()
        .zip(power)
        .filter(|(f, _)| band.contains(**f))
        .map(|(f, p)| (*f, *p))
        .collect()
}

fn trapezoid(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| 0.5 * (w[1].0 - w[0].0) * (w[0].1 + w[1].1))
        .sum()
}

/// Composite Simpson over pairs of intervals; a leftover final interval is
/// closed with the trapezoid rule.
fn simpson(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return trapezoid(points);
    }
    let mut total = 0.0;
    let mut i = 0;
    while i + 2 < points.len() {
        let (x0, y0) = points[i];
        let (x1, y1) = points[i + 1];
        let (x2, y2) = points[i + 2];
        let h0 = x1 - x0;
        let h1 = x2 - x1;
        let span = h0 + h1;
        if h0 <= 0.0 || h1 <= 0.0 {
            total += trapezoid(&points[i..i + 3]);
        } else {
            // Non-uniform Simpson weights; reduce to h/3 (1, 4, 1) for equal steps.
            total += span / 6.0
                * (y0 * (2.0 - h1 / h0) + y1 * span * span / (h0 * h1) + y2 * (2.0 - h0 / h1));
        }
        i += 2;
    }
    if i + 1 < points.len() {
        total += trapezoid(&points[i..]);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    fn flat_psd(value: f64) -> Psd {
        let freqs: Vec<f64> = (0..=1024).map(|k| k as f64 * 4.0 / 2048.0).collect();
        let power = vec![value; freqs.len()];
        Psd {
            freqs,
            power,
            resampled_len: 0,
            segments: 1,
            zero_padded: false,
        }
    }

    #[test]
    fn boundary_bins_are_lower_inclusive() {
        assert!(LF.contains(0.04));
        assert!(!VLF.contains(0.04));
        assert!(HF.contains(0.15));
        assert!(!LF.contains(0.15));
        assert!(!HF.contains(0.4));
    }

    #[test]
    fn bins_on_a_shared_edge_are_counted_once() {
        let freqs = [0.10, 0.15, 0.20];
        let power = [1.0, 1.0, 1.0];
        let lf = select(&freqs, &power, LF);
        let hf = select(&freqs, &power, HF);
        assert_eq!(lf.len() + hf.len(), 3);
        assert_eq!(hf[0].0, 0.15);
    }

    #[test]
    fn trapezoid_integrates_flat_density_over_selected_span() {
        let psd = flat_psd(2.0);
        let m = frequency_domain(&psd, Integration::Trapezoid);
        let df = 4.0 / 2048.0;
        // LF bins: first >= 0.04 is k = 21 (0.041015625), last < 0.15 is k = 76
        let span = (76 - 21) as f64 * df;
        assert!((m.lf - 2.0 * span).abs() < 1e-12);
        assert!(m.vlf > 0.0 && m.hf > 0.0);
    }

    #[test]
    fn simpson_is_exact_for_quadratics() {
        let points: Vec<(f64, f64)> = (0..=10)
            .map(|i| {
                let x = i as f64 * 0.1;
                (x, x * x)
            })
            .collect();
        assert!((simpson(&points) - 1.0 / 3.0).abs() < 1e-12);
        // odd number of intervals falls back to a trapezoid for the tail
        let tail: Vec<(f64, f64)> = points[..10].to_vec();
        assert!(simpson(&tail) > 0.0);
    }

    #[test]
    fn shuffled_bins_give_identical_band_powers() {
        let psd = flat_psd(1.0);
        let power: Vec<f64> = psd
            .freqs
            .iter()
            .map(|f| 100.0 * (-((f - 0.1) / 0.05).powi(2)).exp() + 10.0 * f)
            .collect();
        let mut pairs: Vec<(f64, f64)> = psd
            .freqs
            .iter()
            .copied()
            .zip(power.iter().copied())
            .collect();
        pairs.shuffle(&mut StdRng::seed_from_u64(11));
        let (sf, sp): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        for method in [Integration::Trapezoid, Integration::Simpson] {
            for band in [VLF, LF, HF] {
                let ordered = band_power(&psd.freqs, &power, band, method);
                let shuffled = band_power(&sf, &sp, band, method);
                assert_eq!(ordered, shuffled);
            }
        }
    }

    #[test]
    fn normalized_units_sum_to_one() {
        let m = FrequencyDomainMetrics {
            vlf: 170.0,
            lf: 130.0,
            hf: 108.0,
            peak_lf_hz: None,
            peak_hf_hz: None,
        };
        let sum = m.lf_nu().unwrap() + m.hf_nu().unwrap();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((m.total_power() - 408.0).abs() < 1e-12);
        assert!((m.lf_hf_ratio().unwrap() - 130.0 / 108.0).abs() < 1e-12);
    }

    #[test]
    fn zero_hf_leaves_ratio_undefined() {
        let m = FrequencyDomainMetrics {
            vlf: 1.0,
            lf: 2.0,
            hf: 0.0,
            peak_lf_hz: None,
            peak_hf_hz: None,
        };
        assert_eq!(m.lf_hf_ratio(), None);
        assert_eq!(m.lf_nu(), Some(1.0));
        assert_eq!(m.hf_nu(), Some(0.0));
        let silent = FrequencyDomainMetrics { lf: 0.0, ..m };
        assert_eq!(silent.lf_nu(), None);
        assert_eq!(silent.hf_nu(), None);
    }

    #[test]
    fn peak_is_reported_inside_band() {
        let mut psd = flat_psd(1.0);
        let idx = psd.freqs.iter().position(|f| (*f - 0.25).abs() < 1e-9).unwrap();
        psd.power[idx] = 50.0;
        let m = frequency_domain(&psd, Integration::Trapezoid);
        assert_eq!(m.peak_hf_hz, Some(0.25));
        assert!(m.peak_lf_hz.is_some());
    }
}
