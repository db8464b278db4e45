use crate::error::{HrvError, Result};
use serde::{Deserialize, Serialize};

/// Top-level pipeline settings. Every section falls back to its defaults, so a
/// TOML file only needs to name what it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub validation: ValidationConfig,
    pub spectral: SpectralConfig,
    pub time_domain: TimeDomainConfig,
    pub classifier: ClassifierThresholds,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.validation.validate()?;
        self.spectral.validate()?;
        self.classifier.validate()
    }
}

/// Physiological plausibility window for single beat intervals (seconds).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Shortest accepted interval, inclusive (0.25 s ~ 240 bpm).
    pub min_interval_s: f64,
    /// Longest accepted interval, inclusive (3.0 s ~ 20 bpm).
    pub max_interval_s: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_interval_s: 0.25,
            max_interval_s: 3.0,
        }
    }
}

impl ValidationConfig {
    pub fn accepts(&self, interval_s: f64) -> bool {
        interval_s.is_finite()
            && interval_s >= self.min_interval_s
            && interval_s <= self.max_interval_s
    }

    fn validate(&self) -> Result<()> {
        if !(self.min_interval_s > 0.0) || !(self.max_interval_s > self.min_interval_s) {
            return Err(HrvError::InvalidConfig(format!(
                "interval window [{}, {}] s must be positive and non-empty",
                self.min_interval_s, self.max_interval_s
            )));
        }
        Ok(())
    }
}

/// What to do when the resampled signal is shorter than one Welch segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ShortSeriesPolicy {
    /// Use the whole signal as a single segment, zero-padded to `nfft`.
    #[default]
    ZeroPad,
    /// Reject the session with `InsufficientData`.
    Fail,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Integration {
    #[default]
    Trapezoid,
    Simpson,
}

/// Resampling and Welch parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpectralConfig {
    /// Uniform grid rate for the interpolated interval signal (Hz).
    pub resample_hz: f64,
    /// Welch segment length in samples.
    pub segment_len: usize,
    /// FFT length; segments are zero-padded up to it.
    pub nfft: usize,
    /// Fractional overlap between consecutive segments, in [0, 1).
    pub overlap: f64,
    pub short_series: ShortSeriesPolicy,
    pub integration: Integration,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            resample_hz: 4.0,
            segment_len: 256,
            nfft: 2048,
            overlap: 0.5,
            short_series: ShortSeriesPolicy::ZeroPad,
            integration: Integration::Trapezoid,
        }
    }
}

impl SpectralConfig {
    /// Hop between segment starts, never below one sample.
    pub fn step(&self) -> usize {
        let hop = (self.segment_len as f64 * (1.0 - self.overlap)).round() as usize;
        hop.max(1)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.resample_hz > 0.0) || !self.resample_hz.is_finite() {
            return Err(HrvError::InvalidConfig(format!(
                "resample rate must be positive, got {}",
                self.resample_hz
            )));
        }
        if self.segment_len < 2 {
            return Err(HrvError::InvalidConfig(format!(
                "segment length must be at least 2 samples, got {}",
                self.segment_len
            )));
        }
        if self.nfft < self.segment_len {
            return Err(HrvError::InvalidConfig(format!(
                "nfft ({}) must not be shorter than the segment length ({})",
                self.nfft, self.segment_len
            )));
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(HrvError::InvalidConfig(format!(
                "overlap must lie in [0, 1), got {}",
                self.overlap
            )));
        }
        Ok(())
    }
}

/// Which Poincaré SD2 formula to report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Sd2Method {
    /// `sqrt(2·sdnn² − sd1²)`
    #[default]
    Poincare,
    /// `sd2 = sdnn`, the shortcut used by older session logs.
    Sdnn,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeDomainConfig {
    pub sd2: Sd2Method,
}

/// Category boundaries for the status labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub balanced_low: f64,
    pub balanced_high: f64,
    pub stress_ratio: f64,
    pub recovery_rmssd_ms: f64,
    /// Number of earlier sessions averaged into the RMSSD baseline.
    pub baseline_window: usize,
    /// Dead band around the baseline (ms) for the recovery comparison.
    pub baseline_margin_ms: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            balanced_low: 0.5,
            balanced_high: 2.0,
            stress_ratio: 4.0,
            recovery_rmssd_ms: 20.0,
            baseline_window: 7,
            baseline_margin_ms: 5.0,
        }
    }
}

impl ClassifierThresholds {
    fn validate(&self) -> Result<()> {
        if self.balanced_low > self.balanced_high {
            return Err(HrvError::InvalidConfig(format!(
                "balanced range [{}, {}] is inverted",
                self.balanced_low, self.balanced_high
            )));
        }
        if self.baseline_window == 0 {
            return Err(HrvError::InvalidConfig(
                "baseline window must hold at least one session".into(),
            ));
        }
        Ok(())
    }
}
