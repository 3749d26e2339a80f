use serde::Serialize;

use crate::error::Error;

/// How many rejection messages a report keeps verbatim.
const MAX_REPORTED_REJECTIONS: usize = 20;

/// Report returned after loading a dataset or stability feed.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub source: String,
    pub status: LoadStatus,
    pub rows_loaded: u64,
    pub rows_rejected: u64,
    /// The first few rejection messages, in input order.
    pub rejections: Vec<String>,
}

impl LoadReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            status: LoadStatus::Success,
            rows_loaded: 0,
            rows_rejected: 0,
            rejections: Vec::new(),
        }
    }

    pub fn accept(&mut self) {
        self.rows_loaded += 1;
        self.refresh_status();
    }

    /// Count a rejected row. Only `MalformedRecord`s are expected here, but
    /// any error is recorded by its message.
    pub fn reject(&mut self, err: &Error) {
        log::debug!("{}: rejected row: {err}", self.source);
        self.rows_rejected += 1;
        if self.rejections.len() < MAX_REPORTED_REJECTIONS {
            self.rejections.push(err.to_string());
        }
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        self.status = if self.rows_rejected == 0 {
            LoadStatus::Success
        } else if self.rows_loaded > 0 {
            LoadStatus::PartialFailure
        } else {
            LoadStatus::Failed
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadStatus {
    Success,
    PartialFailure,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_counts() {
        let mut report = LoadReport::new("test.csv");
        assert_eq!(report.status, LoadStatus::Success);

        report.reject(&Error::malformed(2, "bad date"));
        assert_eq!(report.status, LoadStatus::Failed);

        report.accept();
        assert_eq!(report.status, LoadStatus::PartialFailure);
        assert_eq!(report.rows_loaded, 1);
        assert_eq!(report.rows_rejected, 1);
        assert_eq!(report.rejections, vec!["Malformed record at line 2: bad date"]);
    }

    #[test]
    fn test_rejections_capped() {
        let mut report = LoadReport::new("test.csv");
        for line in 0..50 {
            report.reject(&Error::malformed(line, "x"));
        }
        assert_eq!(report.rows_rejected, 50);
        assert_eq!(report.rejections.len(), MAX_REPORTED_REJECTIONS);
    }
}
