use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Regex, RegexBuilder};

use crate::error::{KeeperError, Result};
use crate::record::FileVersion;

/// Filter applied while scanning a host's metadata log.
#[derive(Debug, Clone)]
pub struct ListQuery {
    /// Case-insensitive regex matched against the decoded file name.
    pub regex: Regex,
    /// Exact-date filter: mtime must fall inside the window.
    pub date: Option<DateWindow>,
    /// Inclusive lower bound on mtime (epoch seconds).
    pub afterdate: Option<i64>,
    /// Inclusive upper bound on mtime (epoch seconds).
    pub beforedate: Option<i64>,
    /// Collapse the result to the newest record per path.
    pub latest: bool,
    /// Decode only `(file type, mtime, size, name)` for list-only callers.
    pub reduced: bool,
}

impl ListQuery {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| KeeperError::Filter(format!("bad filename regex: {e}")))?;
        Ok(ListQuery {
            regex,
            date: None,
            afterdate: None,
            beforedate: None,
            latest: false,
            reduced: false,
        })
    }

    /// A query that matches every record.
    pub fn match_all() -> Self {
        Self::new("").expect("empty pattern compiles")
    }

    pub fn mtime_matches(&self, mtime: u64) -> bool {
        let t = mtime as i64;
        if let Some(window) = &self.date {
            if t < window.start || t > window.end {
                return false;
            }
        }
        if let Some(after) = self.afterdate {
            if t < after {
                return false;
            }
        }
        if let Some(before) = self.beforedate {
            if t > before {
                return false;
            }
        }
        true
    }
}

/// Inclusive epoch-second range implied by a date string's precision: a bare
/// `YYYY-MM-DD` covers the whole day, a full `YYYY-MM-DD HH:MM:SS` one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: i64,
    pub end: i64,
}

/// Parse a filter date, interpreted as UTC.
pub fn parse_date_window(s: &str) -> Result<DateWindow> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        let t = dt.and_utc().timestamp();
        return Ok(DateWindow { start: t, end: t });
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let start = day.and_time(NaiveTime::MIN).and_utc().timestamp();
        return Ok(DateWindow {
            start,
            end: start + 86_399,
        });
    }
    Err(KeeperError::Filter(format!("unparseable date '{s}'")))
}

/// Sort records by `(name, mtime)` ascending, the order the file-list answer
/// promises.
pub fn sort_records(records: &mut [FileVersion]) {
    records.sort_by(|a, b| a.name.cmp(&b.name).then(a.mtime.cmp(&b.mtime)));
}

/// Collapse a `(name, mtime)`-sorted list to the newest record per path.
pub fn keep_latest(records: Vec<FileVersion>) -> Vec<FileVersion> {
    let mut out: Vec<FileVersion> = Vec::new();
    for record in records {
        match out.last_mut() {
            Some(last) if last.name == record.name => *last = record,
            _ => out.push(record),
        }
    }
    out
}
