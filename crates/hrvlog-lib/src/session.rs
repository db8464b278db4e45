use crate::metrics::frequency::FrequencyDomainMetrics;
use crate::metrics::time::TimeDomainMetrics;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of an ingested session plus pass-through summary fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub date: NaiveDateTime,
    #[serde(default)]
    pub source: Option<String>,
    /// Per-session fields from the export that the pipeline does not interpret.
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl SessionMeta {
    pub fn new(session_id: impl Into<String>, date: NaiveDateTime) -> Self {
        Self {
            session_id: session_id.into(),
            date,
            source: None,
            extras: BTreeMap::new(),
        }
    }
}

/// How the metrics were obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub total_beats: usize,
    pub excluded_beats: usize,
    pub resampled_samples: usize,
    pub segments: usize,
    pub zero_padded: bool,
}

/// One row of the HRV log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvSessionResult {
    pub meta: SessionMeta,
    pub time: TimeDomainMetrics,
    pub frequency: FrequencyDomainMetrics,
    pub provenance: Provenance,
}

impl HrvSessionResult {
    pub fn session_id(&self) -> &str {
        &self.meta.session_id
    }

    pub fn date(&self) -> NaiveDateTime {
        self.meta.date
    }

    pub fn sd2_sd1_ratio(&self) -> Option<f64> {
        self.time.sd2_sd1_ratio()
    }

    pub fn lf_hf_ratio(&self) -> Option<f64> {
        self.frequency.lf_hf_ratio()
    }

    pub fn lf_nu(&self) -> Option<f64> {
        self.frequency.lf_nu()
    }

    pub fn hf_nu(&self) -> Option<f64> {
        self.frequency.hf_nu()
    }

    /// Look up a scalar metric by its column name.
    pub fn metric(&self, name: &str) -> Option<f64> {
        let t = &self.time;
        let f = &self.frequency;
        match name {
            "sdnn" => Some(t.sdnn),
            "rmssd" => Some(t.rmssd),
            "sdsd" => Some(t.sdsd),
            "pnn50" => Some(t.pnn50),
            "pnn20" => Some(t.pnn20),
            "mean_rr" => Some(t.mean_rr),
            "mean_hr" => Some(t.mean_hr),
            "sd1" => Some(t.sd1),
            "sd2" => Some(t.sd2),
            "sd2_sd1_ratio" => t.sd2_sd1_ratio(),
            "ln_rmssd" => t.ln_rmssd(),
            "vlf" => Some(f.vlf),
            "lf" => Some(f.lf),
            "hf" => Some(f.hf),
            "total_power" => Some(f.total_power()),
            "lf_hf_ratio" => f.lf_hf_ratio(),
            "lf_nu" => f.lf_nu(),
            "hf_nu" => f.hf_nu(),
            _ => None,
        }
    }

    pub fn to_row(&self) -> SessionRow {
        SessionRow::from(self)
    }
}

/// Flat, one-column-per-field projection used by tabular stores.
///
/// Ratio columns are written for readers of the file but ignored when a row is
/// turned back into a [`HrvSessionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub session_id: String,
    pub date: NaiveDateTime,
    #[serde(default)]
    pub source: Option<String>,
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
    #[serde(default)]
    pub sd2_sd1_ratio: Option<f64>,
    pub vlf: f64,
    pub lf: f64,
    pub hf: f64,
    #[serde(default)]
    pub lf_hf_ratio: Option<f64>,
    #[serde(default)]
    pub lf_nu: Option<f64>,
    #[serde(default)]
    pub hf_nu: Option<f64>,
    #[serde(default)]
    pub peak_lf_hz: Option<f64>,
    #[serde(default)]
    pub peak_hf_hz: Option<f64>,
    pub total_beats: usize,
    pub excluded_beats: usize,
    #[serde(default)]
    pub resampled_samples: usize,
    #[serde(default)]
    pub segments: usize,
    #[serde(default)]
    pub zero_padded: bool,
    /// JSON object of the pass-through session fields.
    #[serde(default)]
    pub extras: String,
}

impl From<&HrvSessionResult> for SessionRow {
    fn from(r: &HrvSessionResult) -> Self {
        let t = &r.time;
        let f = &r.frequency;
        Self {
            session_id: r.meta.session_id.clone(),
            date: r.meta.date,
            source: r.meta.source.clone(),
            n: t.n,
            mean_rr: t.mean_rr,
            mean_hr: t.mean_hr,
            sdnn: t.sdnn,
            rmssd: t.rmssd,
            sdsd: t.sdsd,
            nn50: t.nn50,
            pnn50: t.pnn50,
            nn20: t.nn20,
            pnn20: t.pnn20,
            sd1: t.sd1,
            sd2: t.sd2,
            sd2_sd1_ratio: t.sd2_sd1_ratio(),
            vlf: f.vlf,
            lf: f.lf,
            hf: f.hf,
            lf_hf_ratio: f.lf_hf_ratio(),
            lf_nu: f.lf_nu(),
            hf_nu: f.hf_nu(),
            peak_lf_hz: f.peak_lf_hz,
            peak_hf_hz: f.peak_hf_hz,
            total_beats: r.provenance.total_beats,
            excluded_beats: r.provenance.excluded_beats,
            resampled_samples: r.provenance.resampled_samples,
            segments: r.provenance.segments,
            zero_padded: r.provenance.zero_padded,
            extras: extras_json(&r.meta.extras),
        }
    }
}

/// JSON object text for the extras column; empty when there are none.
fn extras_json(extras: &BTreeMap<String, String>) -> String {
    if extras.is_empty() {
        return String::new();
    }
    serde_json::Value::Object(
        extras
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    )
    .to_string()
}

/// Rebuilds a result from a stored row. Fails when the extras column is not a
/// JSON object of strings, so a damaged cell is never silently dropped.
impl TryFrom<SessionRow> for HrvSessionResult {
    type Error = serde_json::Error;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let extras = if row.extras.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&row.extras)?
        };
        Ok(Self {
            meta: SessionMeta {
                session_id: row.session_id,
                date: row.date,
                source: row.source,
                extras,
            },
            time: TimeDomainMetrics {
                n: row.n,
                mean_rr: row.mean_rr,
                mean_hr: row.mean_hr,
                sdnn: row.sdnn,
                rmssd: row.rmssd,
                sdsd: row.sdsd,
                nn50: row.nn50,
                pnn50: row.pnn50,
                nn20: row.nn20,
                pnn20: row.pnn20,
                sd1: row.sd1,
                sd2: row.sd2,
            },
            frequency: FrequencyDomainMetrics {
                vlf: row.vlf,
                lf: row.lf,
                hf: row.hf,
                peak_lf_hz: row.peak_lf_hz,
                peak_hf_hz: row.peak_hf_hz,
            },
            provenance: Provenance {
                total_beats: row.total_beats,
                excluded_beats: row.excluded_beats,
                resampled_samples: row.resampled_samples,
                segments: row.segments,
                zero_padded: row.zero_padded,
            },
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    pub fn date(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|d| d.and_hms_opt(7, 0, 0))
            .unwrap()
    }

    /// Hand-built result with the given headline metrics.
    pub fn result(id: &str, day: u32, rmssd: f64, lf: f64, hf: f64) -> HrvSessionResult {
        HrvSessionResult {
            meta: SessionMeta::new(id, date(day)),
            time: TimeDomainMetrics {
                n: 300,
                mean_rr: 860.0,
                mean_hr: 60.0 / 0.86,
                sdnn: 56.49,
                rmssd,
                sdsd: rmssd,
                nn50: 20,
                pnn50: 7.0,
                nn20: 60,
                pnn20: 20.0,
                sd1: 22.0,
                sd2: 77.0,
            },
            frequency: FrequencyDomainMetrics {
                vlf: 170.0,
                lf,
                hf,
                peak_lf_hz: Some(0.1),
                peak_hf_hz: Some(0.25),
            },
            provenance: Provenance {
                total_beats: 301,
                excluded_beats: 1,
                resampled_samples: 1000,
                segments: 6,
                zero_padded: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::result;
    use super::*;

    #[test]
    fn row_round_trip_recomputes_ratios() {
        let mut original = result("s1", 1, 32.0, 130.0, 108.0);
        original
            .meta
            .extras
            .insert("recovery".into(), "53".into());
        let mut row = original.to_row();
        assert_eq!(row.lf_hf_ratio, Some(130.0 / 108.0));
        row.lf_hf_ratio = Some(99.0);
        row.sd2_sd1_ratio = None;
        let back = HrvSessionResult::try_from(row).unwrap();
        assert_eq!(back, original);
        assert_eq!(back.lf_hf_ratio(), Some(130.0 / 108.0));
        assert_eq!(back.sd2_sd1_ratio(), Some(77.0 / 22.0));
    }

    #[test]
    fn metric_lookup_by_name() {
        let r = result("s1", 1, 32.0, 130.0, 0.0);
        assert_eq!(r.metric("rmssd"), Some(32.0));
        assert_eq!(r.metric("lf_hf_ratio"), None);
        assert_eq!(r.metric("hf_nu"), Some(0.0));
        assert_eq!(r.metric("bogus"), None);
    }

    #[test]
    fn json_carries_derived_ratios() {
        let r = result("s1", 1, 32.0, 130.0, 108.0);
        let value = serde_json::to_value(&r).unwrap();
        assert!(value["frequency"]["lf_nu"].as_f64().is_some());
        assert!(value["time"]["sd2_sd1_ratio"].as_f64().is_some());
        let back: HrvSessionResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.meta, r.meta);
        assert!((back.time.mean_hr - r.time.mean_hr).abs() < 1e-9);
        assert_eq!(back.frequency.lf, 130.0);
    }

    #[test]
    fn damaged_extras_cell_is_an_error() {
        let mut row = result("s1", 1, 32.0, 130.0, 108.0).to_row();
        row.extras = "{\"k\": \"v\"".into();
        assert!(HrvSessionResult::try_from(row).is_err());
    }

    #[test]
    fn extras_column_escapes_text() {
        let mut original = result("s1", 1, 32.0, 130.0, 108.0);
        original
            .meta
            .extras
            .insert("note".into(), "said \"fine\", then left".into());
        let row = original.to_row();
        let back = HrvSessionResult::try_from(row).unwrap();
        assert_eq!(back.meta.extras, original.meta.extras);
    }
}
