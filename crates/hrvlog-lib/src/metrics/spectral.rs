//! Uniform resampling of beat intervals and Welch power spectral density.

use crate::config::{ShortSeriesPolicy, SpectralConfig};
use crate::error::{HrvError, Result};
use crate::signal::IntervalSeries;
use log::debug;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One-sided power spectral density of the interval signal (ms²/Hz).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Psd {
    /// Bin centres in Hz, strictly increasing from 0.
    pub freqs: Vec<f64>,
    pub power: Vec<f64>,
    /// Length of the resampled signal the estimate came from.
    pub resampled_len: usize,
    /// Number of averaged periodograms.
    pub segments: usize,
    /// True when the signal was shorter than one segment and padded instead.
    pub zero_padded: bool,
}

impl Psd {
    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    pub fn points(&self) -> Vec<[f64; 2]> {
        self.freqs
            .iter()
            .zip(&self.power)
            .map(|(f, p)| [*f, *p])
            .collect()
    }
}

/// Resample and estimate the PSD of a session in one step.
pub fn estimate_psd(series: &IntervalSeries, cfg: &SpectralConfig) -> Result<Psd> {
    cfg.validate()?;
    let signal = resample(series, cfg.resample_hz);
    welch_psd(&signal, cfg)
}

/// Linearly interpolate the interval values (ms) onto a `fs` Hz grid over the
/// beat occurrence axis.
pub fn resample(series: &IntervalSeries, fs: f64) -> Vec<f64> {
    let times = series.beat_times();
    let values: Vec<f64> = series.intervals().iter().map(|s| s * 1000.0).collect();
    let Some(&t_last) = times.last() else {
        return Vec::new();
    };
    let n = (t_last * fs).floor() as usize + 1;
    let mut signal = Vec::with_capacity(n);
    let mut idx = 0;
    for k in 0..n {
        let t = k as f64 / fs;
        while idx + 2 < times.len() && times[idx + 1] <= t {
            idx += 1;
        }
        let (t0, t1) = (times[idx], times[idx + 1]);
        let (v0, v1) = (values[idx], values[idx + 1]);
        let value = if t >= t1 {
            v1
        } else if t1 > t0 {
            v0 + (v1 - v0) * (t - t0) / (t1 - t0)
        } else {
            v0
        };
        signal.push(value);
    }
    signal
}

/// Welch's averaged periodogram with a periodic Hann window, per-segment mean
/// removal and density scaling.
pub fn welch_psd(signal: &[f64], cfg: &SpectralConfig) -> Result<Psd> {
    cfg.validate()?;
    let n = signal.len();
    if n < 2 {
        return Err(HrvError::InsufficientData {
            context: "resampled signal",
            needed: 2,
            found: n,
        });
    }
    let (window_len, zero_padded) = if n < cfg.segment_len {
        match cfg.short_series {
            ShortSeriesPolicy::Fail => {
                return Err(HrvError::InsufficientData {
                    context: "welch segment",
                    needed: cfg.segment_len,
                    found: n,
                })
            }
            ShortSeriesPolicy::ZeroPad => {
                debug!(
                    "signal of {n} samples shorter than segment {}, zero-padding",
                    cfg.segment_len
                );
                (n, true)
            }
        }
    } else {
        (cfg.segment_len, false)
    };
    let nfft = cfg.nfft.max(window_len);
    let fs = cfg.resample_hz;
    let step = if zero_padded { n } else { cfg.step() };

    let window = hann(window_len);
    let scale = 1.0 / (fs * window.iter().map(|w| w * w).sum::<f64>());
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(nfft);
    let bins = nfft / 2 + 1;
    let mut power = vec![0.0; bins];
    let mut spectrum = r2c.make_output_vec();
    let mut pos = 0;
    let mut segments = 0;
    while pos + window_len <= n {
        let slice = &signal[pos..pos + window_len];
        let offset = slice.iter().sum::<f64>() / window_len as f64;
        let mut frame = r2c.make_input_vec();
        for (dst, (x, w)) in frame.iter_mut().zip(slice.iter().zip(&window)) {
            *dst = (x - offset) * w;
        }
        r2c.process(&mut frame, &mut spectrum)
            .map_err(|e| HrvError::Fft(e.to_string()))?;
        for (k, val) in spectrum.iter().enumerate() {
            let one_sided = if k == 0 || (nfft % 2 == 0 && k == nfft / 2) {
                1.0
            } else {
                2.0
            };
            power[k] += one_sided * val.norm_sqr() * scale;
        }
        segments += 1;
        pos += step;
    }
    for p in power.iter_mut() {
        *p /= segments as f64;
    }
    let freqs = (0..bins).map(|k| k as f64 * fs / nfft as f64).collect();
    Ok(Psd {
        freqs,
        power,
        resampled_len: n,
        segments,
        zero_padded,
    })
}

fn hann(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size as f64)).cos()))
        .collect()
}
