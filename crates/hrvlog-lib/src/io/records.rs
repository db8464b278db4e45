//! Per-beat CSV exports: one row per beat with an `rr_ms` column, an optional
//! `timestamp` column and any number of auxiliary channels.

use chrono::{DateTime, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

pub const RR_COLUMN: &str = "rr_ms";
pub const TIMESTAMP_COLUMN: &str = "timestamp";

#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("row {row}: cannot parse {column} value `{value}`")]
    Parse {
        row: usize,
        column: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatRecord {
    pub timestamp: Option<NaiveDateTime>,
    pub rr_ms: f64,
    /// Remaining columns, untouched.
    pub aux: BTreeMap<String, String>,
}

pub fn read_records(path: &Path) -> Result<Vec<BeatRecord>, RecordsError> {
    let reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
    collect(reader)
}

pub fn parse_records<R: Read>(input: R) -> Result<Vec<BeatRecord>, RecordsError> {
    let reader = ReaderBuilder::new().trim(Trim::All).from_reader(input);
    collect(reader)
}

fn collect<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<BeatRecord>, RecordsError> {
    let headers = reader.headers()?.clone();
    let rr_idx = column(&headers, RR_COLUMN).ok_or(RecordsError::MissingColumn(RR_COLUMN))?;
    let ts_idx = column(&headers, TIMESTAMP_COLUMN);
    let mut out = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row?;
        let line = idx + 2;
        let raw_rr = row.get(rr_idx).unwrap_or_default();
        if raw_rr.is_empty() {
            continue;
        }
        let rr_ms = raw_rr.parse::<f64>().map_err(|_| RecordsError::Parse {
            row: line,
            column: RR_COLUMN,
            value: raw_rr.to_string(),
        })?;
        let timestamp = match ts_idx.and_then(|i| row.get(i)).filter(|s| !s.is_empty()) {
            Some(text) => Some(parse_timestamp(text).ok_or_else(|| RecordsError::Parse {
                row: line,
                column: TIMESTAMP_COLUMN,
                value: text.to_string(),
            })?),
            None => None,
        };
        let aux = headers
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(i, _)| *i != rr_idx && Some(*i) != ts_idx)
            .map(|(_, (h, v))| (h.to_string(), v.to_string()))
            .collect();
        out.push(BeatRecord {
            timestamp,
            rr_ms,
            aux,
        });
    }
    Ok(out)
}

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

/// RFC 3339 (converted to UTC) or a naive `YYYY-MM-DD[ T]HH:MM:SS[.f]`.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// Interval column of a record set, in file order.
pub fn rr_ms(records: &[BeatRecord]) -> Vec<f64> {
    records.iter().map(|r| r.rr_ms).collect()
}

/// Earliest timestamp among the records, if any carry one.
pub fn session_start(records: &[BeatRecord]) -> Option<NaiveDateTime> {
    records.iter().filter_map(|r| r.timestamp).min()
}

/// One value per auxiliary channel for the whole recording.
///
/// Numeric channels become their mean to two decimals; a text channel is kept
/// only when every non-blank cell agrees. Blank cells are ignored.
pub fn session_extras(records: &[BeatRecord]) -> BTreeMap<String, String> {
    let mut columns: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for record in records {
        for (key, value) in &record.aux {
            if !value.is_empty() {
                columns.entry(key.as_str()).or_default().push(value.as_str());
            }
        }
    }
    columns
        .into_iter()
        .filter_map(|(key, values)| summarize(&values).map(|v| (key.to_string(), v)))
        .collect()
}

fn summarize(values: &[&str]) -> Option<String> {
    let first = *values.first()?;
    let numbers: Option<Vec<f64>> = values
        .iter()
        .map(|v| v.parse::<f64>().ok().filter(|x| x.is_finite()))
        .collect();
    match numbers {
        Some(nums) => {
            let mean = nums.iter().sum::<f64>() / nums.len() as f64;
            Some(format!("{mean:.2}"))
        }
        None => values.iter().all(|v| *v == first).then(|| first.to_string()),
    }
}
