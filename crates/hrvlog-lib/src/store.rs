use crate::session::HrvSessionResult;
use std::convert::Infallible;

/// Persistence boundary for the HRV log.
///
/// Rows are keyed by `session_id`; re-ingesting an id replaces the old row.
/// Readers always see rows ordered by session date (ties broken by id).
pub trait SessionStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert or replace a row, returning the row it replaced.
    fn upsert(&mut self, result: HrvSessionResult)
        -> Result<Option<HrvSessionResult>, Self::Error>;

    fn sessions(&self) -> &[HrvSessionResult];

    fn get(&self, session_id: &str) -> Option<&HrvSessionResult> {
        self.sessions().iter().find(|r| r.session_id() == session_id)
    }

    fn len(&self) -> usize {
        self.sessions().len()
    }

    fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Most recent session by date.
    fn latest(&self) -> Option<&HrvSessionResult> {
        self.sessions().last()
    }
}

/// In-memory, date-ordered HRV log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionLog {
    rows: Vec<HrvSessionResult>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from arbitrary rows; later duplicates of an id win.
    pub fn from_rows(rows: impl IntoIterator<Item = HrvSessionResult>) -> Self {
        let mut log = Self::new();
        for row in rows {
            log.insert(row);
        }
        log
    }

    pub fn insert(&mut self, result: HrvSessionResult) -> Option<HrvSessionResult> {
        let previous = self
            .rows
            .iter()
            .position(|r| r.session_id() == result.session_id())
            .map(|idx| self.rows.remove(idx));
        let key = (result.date(), result.session_id().to_owned());
        let at = self
            .rows
            .partition_point(|r| (r.date(), r.session_id()) <= (key.0, key.1.as_str()));
        self.rows.insert(at, result);
        previous
    }

    pub fn iter(&self) -> impl Iterator<Item = &HrvSessionResult> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<HrvSessionResult> {
        self.rows
    }
}

impl SessionStore for SessionLog {
    type Error = Infallible;

    fn upsert(&mut self, result: HrvSessionResult) -> Result<Option<HrvSessionResult>, Infallible> {
        Ok(self.insert(result))
    }

    fn sessions(&self) -> &[HrvSessionResult] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixtures::result;

    #[test]
    fn rows_come_back_in_date_order() {
        let mut log = SessionLog::new();
        log.upsert(result("c", 3, 30.0, 1.0, 1.0)).unwrap();
        log.upsert(result("a", 1, 30.0, 1.0, 1.0)).unwrap();
        log.upsert(result("b", 2, 30.0, 1.0, 1.0)).unwrap();
        let ids: Vec<&str> = log.sessions().iter().map(|r| r.session_id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(log.latest().map(|r| r.session_id()), Some("c"));
    }

    #[test]
    fn upsert_replaces_same_session_id() {
        let mut log = SessionLog::new();
        assert!(log.upsert(result("a", 1, 30.0, 1.0, 1.0)).unwrap().is_none());
        let previous = log.upsert(result("a", 5, 42.0, 1.0, 1.0)).unwrap();
        assert_eq!(previous.map(|r| r.time.rmssd), Some(30.0));
        assert_eq!(log.len(), 1);
        assert_eq!(log.get("a").map(|r| r.time.rmssd), Some(42.0));
    }

    #[test]
    fn same_date_ties_break_on_id() {
        let log = SessionLog::from_rows(vec![
            result("z", 1, 30.0, 1.0, 1.0),
            result("m", 1, 30.0, 1.0, 1.0),
        ]);
        let ids: Vec<&str> = log.iter().map(|r| r.session_id()).collect();
        assert_eq!(ids, vec!["m", "z"]);
    }

    #[test]
    fn empty_log_has_no_latest() {
        let log = SessionLog::new();
        assert!(log.is_empty());
        assert!(log.latest().is_none());
    }
}
