//! File-backed persistence for the HRV log and pipeline configuration.

pub mod config;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use hrvlog_lib::{HrvSessionResult, SessionLog, SessionRow, SessionStore};
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub use config::{load_config, parse_config, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed log {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("malformed extras for session {session_id} in {path}: {source}")]
    Extras {
        path: PathBuf,
        session_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// HRV log kept in a single CSV file, one [`SessionRow`] per line.
///
/// The whole file is rewritten on every upsert through a temporary file in the
/// same directory, so readers never observe a half-written log.
#[derive(Debug)]
pub struct CsvSessionStore {
    path: PathBuf,
    log: SessionLog,
}

impl CsvSessionStore {
    /// Open the log at `path`. A missing file is an empty log.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let log = if path.exists() {
            SessionLog::from_rows(read_rows(&path)?)
        } else {
            debug!("{} does not exist yet, starting an empty log", path.display());
            SessionLog::new()
        };
        info!("opened {} with {} sessions", path.display(), log.len());
        Ok(Self { path, log })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Upsert several rows and write the file once.
    pub fn upsert_many(
        &mut self,
        results: impl IntoIterator<Item = HrvSessionResult>,
    ) -> Result<usize, StoreError> {
        let mut next = self.log.clone();
        let mut replaced = 0;
        for result in results {
            if next.insert(result).is_some() {
                replaced += 1;
            }
        }
        self.commit(next)?;
        Ok(replaced)
    }

    /// Persist `next` and only then make it the in-memory log.
    fn commit(&mut self, next: SessionLog) -> Result<(), StoreError> {
        self.save(&next)?;
        self.log = next;
        Ok(())
    }

    fn save(&self, log: &SessionLog) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        {
            let mut writer = WriterBuilder::new().from_writer(tmp.as_file());
            for row in log.iter().map(SessionRow::from) {
                writer
                    .serialize(row)
                    .map_err(|e| StoreError::csv(&self.path, e))?;
            }
            writer.flush().map_err(|e| StoreError::io(&self.path, e))?;
        }
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;
        debug!("wrote {} sessions to {}", log.len(), self.path.display());
        Ok(())
    }
}

impl SessionStore for CsvSessionStore {
    type Error = StoreError;

    fn upsert(&mut self, result: HrvSessionResult) -> Result<Option<HrvSessionResult>, StoreError> {
        let mut next = self.log.clone();
        let previous = next.insert(result);
        self.commit(next)?;
        Ok(previous)
    }

    fn sessions(&self) -> &[HrvSessionResult] {
        self.log.sessions()
    }
}

fn read_rows(path: &Path) -> Result<Vec<HrvSessionResult>, StoreError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| StoreError::csv(path, e))?;
    let mut rows = Vec::new();
    for row in reader.deserialize::<SessionRow>() {
        let row = row.map_err(|e| StoreError::csv(path, e))?;
        let session_id = row.session_id.clone();
        let result = HrvSessionResult::try_from(row).map_err(|source| StoreError::Extras {
            path: path.to_path_buf(),
            session_id,
            source,
        })?;
        rows.push(result);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hrvlog_lib::{
        FrequencyDomainMetrics, Provenance, SessionMeta, TimeDomainMetrics,
    };
    use tempfile::tempdir;

    fn sample(id: &str, day: u32, rmssd: f64) -> HrvSessionResult {
        let date = NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        let mut meta = SessionMeta::new(id, date);
        meta.extras.insert("posture".into(), "supine, rested".into());
        HrvSessionResult {
            meta,
            time: TimeDomainMetrics {
                n: 300,
                mean_rr: 860.0,
                mean_hr: 69.75,
                sdnn: 50.0,
                rmssd,
                sdsd: rmssd,
                nn50: 20,
                pnn50: 6.68,
                nn20: 90,
                pnn20: 30.1,
                sd1: 25.0,
                sd2: 65.0,
            },
            frequency: FrequencyDomainMetrics {
                vlf: 120.0,
                lf: 600.0,
                hf: 0.0,
                peak_lf_hz: Some(0.1),
                peak_hf_hz: None,
            },
            provenance: Provenance {
                total_beats: 301,
                excluded_beats: 1,
                resampled_samples: 1032,
                segments: 7,
                zero_padded: false,
            },
        }
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let store = CsvSessionStore::open(dir.path().join("log.csv")).unwrap();
        assert!(store.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn upserts_survive_reopen_in_date_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("log.csv");
        let mut store = CsvSessionStore::open(&path).unwrap();
        store.upsert(sample("b", 5, 40.0)).unwrap();
        store.upsert(sample("a", 2, 30.0)).unwrap();

        let reopened = CsvSessionStore::open(&path).unwrap();
        let ids: Vec<&str> = reopened.sessions().iter().map(|r| r.session_id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let a = reopened.get("a").unwrap();
        assert_eq!(a.time.rmssd, 30.0);
        assert_eq!(a.meta.extras.get("posture").map(String::as_str), Some("supine, rested"));
        assert_eq!(a.frequency.peak_hf_hz, None);
        assert_eq!(a.lf_hf_ratio(), None);
        assert_eq!(a.provenance.segments, 7);
    }

    #[test]
    fn reingesting_an_id_replaces_the_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut store = CsvSessionStore::open(&path).unwrap();
        store.upsert(sample("a", 2, 30.0)).unwrap();
        let previous = store.upsert(sample("a", 2, 45.0)).unwrap();
        assert_eq!(previous.map(|r| r.time.rmssd), Some(30.0));

        let reopened = CsvSessionStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.latest().map(|r| r.time.rmssd), Some(45.0));
    }

    #[test]
    fn batch_upsert_counts_replacements() {
        let dir = tempdir().unwrap();
        let mut store = CsvSessionStore::open(dir.path().join("log.csv")).unwrap();
        store.upsert(sample("a", 1, 30.0)).unwrap();
        let replaced = store
            .upsert_many(vec![sample("a", 1, 31.0), sample("b", 3, 33.0)])
            .unwrap();
        assert_eq!(replaced, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn ratio_columns_are_written_for_readers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut store = CsvSessionStore::open(&path).unwrap();
        store.upsert(sample("a", 1, 30.0)).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.contains("sd2_sd1_ratio"));
        assert!(header.contains("lf_hf_ratio"));
    }

    #[test]
    fn garbage_file_is_a_csv_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(&path, "session_id,date\nx,not-a-date\n").unwrap();
        assert!(matches!(CsvSessionStore::open(&path), Err(StoreError::Csv { .. })));
    }

    #[test]
    fn damaged_extras_cell_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut store = CsvSessionStore::open(&path).unwrap();
        store.upsert(sample("a", 1, 30.0)).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(r#"rested""}""#));
        fs::write(&path, text.replace(r#"rested""}""#, r#"rested""#)).unwrap();

        match CsvSessionStore::open(&path) {
            Err(StoreError::Extras { session_id, .. }) => assert_eq!(session_id, "a"),
            other => panic!("expected an extras error, got {other:?}"),
        }
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let mut store = CsvSessionStore::open(blocker.join("log.csv")).unwrap();

        assert!(matches!(store.upsert(sample("a", 1, 30.0)), Err(StoreError::Io { .. })));
        assert!(store.is_empty());
        assert!(store.upsert_many(vec![sample("b", 2, 31.0)]).is_err());
        assert!(store.is_empty());
        assert!(store.get("a").is_none());
    }
}
