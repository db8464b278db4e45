use crate::config::PipelineConfig;
use crate::error::Result;
use crate::metrics::frequency::frequency_domain;
use crate::metrics::spectral::estimate_psd;
use crate::metrics::time::time_domain;
use crate::session::{HrvSessionResult, Provenance, SessionMeta};
use crate::signal::IntervalSeries;
use log::{info, warn};
use rayon::prelude::*;

/// Raw input for one session as delivered by a parser.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInput {
    pub meta: SessionMeta,
    /// Beat-to-beat gaps in milliseconds, in recording order.
    pub rr_ms: Vec<f64>,
}

/// Run validation, time-domain, spectral and band computations for one session.
pub fn analyze(
    raw_ms: &[f64],
    meta: SessionMeta,
    cfg: &PipelineConfig,
) -> Result<HrvSessionResult> {
    cfg.validate()?;
    let (series, report) = IntervalSeries::from_millis(raw_ms, Some(meta.date), &cfg.validation)?;
    let time = time_domain(&series, cfg.time_domain.sd2);
    let psd = estimate_psd(&series, &cfg.spectral)?;
    let frequency = frequency_domain(&psd, cfg.spectral.integration);
    info!(
        "session {}: {} beats, rmssd {:.1} ms, lf/hf {:?}",
        meta.session_id,
        series.len(),
        time.rmssd,
        frequency.lf_hf_ratio()
    );
    Ok(HrvSessionResult {
        meta,
        time,
        frequency,
        provenance: Provenance {
            total_beats: report.total,
            excluded_beats: report.excluded,
            resampled_samples: psd.resampled_len,
            segments: psd.segments,
            zero_padded: psd.zero_padded,
        },
    })
}

/// Analyze independent sessions in parallel. Results keep the input order and
/// a failing session never affects the others.
pub fn analyze_batch(
    inputs: Vec<SessionInput>,
    cfg: &PipelineConfig,
) -> Vec<(String, Result<HrvSessionResult>)> {
    inputs
        .into_par_iter()
        .map(|input| {
            let id = input.meta.session_id.clone();
            let outcome = analyze(&input.rr_ms, input.meta, cfg);
            if let Err(err) = &outcome {
                warn!("skipping session {id}: {err}");
            }
            (id, outcome)
        })
        .collect()
}
