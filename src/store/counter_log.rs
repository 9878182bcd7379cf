//! Plain-text `timestamp,object_count` log, one row per processed frame.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::PathBuf,
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use crate::db::helpers::parse_rfc3339;

pub const COUNTER_LOG_HEADER: &str = "timestamp,object_count";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterRow {
    pub timestamp: DateTime<Utc>,
    pub object_count: usize,
}

pub struct CounterLog {
    path: PathBuf,
    file: File,
}

impl CounterLog {
    /// Open (or create) the log for appending. A new or empty file gets the header.
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create counter log directory {}", parent.display())
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open counter log {}", path.display()))?;

        if file.metadata()?.len() == 0 {
            writeln!(file, "{COUNTER_LOG_HEADER}")?;
            file.flush()?;
        }

        Ok(Self { path, file })
    }

    /// Drop every row and rewrite the header.
    pub fn reset(&mut self) -> Result<()> {
        self.file
            .set_len(0)
            .with_context(|| format!("failed to truncate {}", self.path.display()))?;
        writeln!(self.file, "{COUNTER_LOG_HEADER}")?;
        self.file.flush()?;
        Ok(())
    }

    /// Append one row and return the file length before the write, for
    /// [`CounterLog::rollback_to`].
    ///
    /// A failed write leaves the file as it was.
    pub fn append_row(&mut self, timestamp: DateTime<Utc>, object_count: usize) -> Result<u64> {
        let previous_len = self.file.metadata()?.len();
        let row = format!("{},{}\n", timestamp.to_rfc3339(), object_count);

        if let Err(err) = self.write_all_flushed(row.as_bytes()) {
            if let Err(rollback_err) = self.rollback_to(previous_len) {
                warn!("{rollback_err:#}");
            }
            return Err(anyhow::Error::new(err)
                .context(format!("failed to append to {}", self.path.display())));
        }
        Ok(previous_len)
    }

    fn write_all_flushed(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.flush()
    }

    /// Cut the file back to `len` bytes, undoing rows appended after that point.
    pub fn rollback_to(&mut self, len: u64) -> Result<()> {
        self.file
            .set_len(len)
            .with_context(|| format!("failed to roll back {}", self.path.display()))
    }

    pub fn rows(&self) -> Result<Vec<CounterRow>> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;

        let mut lines = contents.lines();
        match lines.next() {
            Some(COUNTER_LOG_HEADER) => {}
            Some(other) => return Err(anyhow!("unexpected counter log header '{other}'")),
            None => return Ok(Vec::new()),
        }

        lines
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (timestamp, count) = line
                    .rsplit_once(',')
                    .ok_or_else(|| anyhow!("malformed counter log row '{line}'"))?;
                Ok(CounterRow {
                    timestamp: parse_rfc3339(timestamp)?,
                    object_count: count
                        .trim()
                        .parse()
                        .with_context(|| format!("bad object_count in '{line}'"))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn new_file_starts_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("object_log.csv");
        let _log = CounterLog::open(path.clone()).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "timestamp,object_count\n");
    }

    #[test]
    fn reset_discards_rows() {
        let dir = TempDir::new().unwrap();
        let mut log = CounterLog::open(dir.path().join("object_log.csv")).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        log.append_row(ts, 3).unwrap();
        log.append_row(ts, 0).unwrap();
        assert_eq!(log.rows().unwrap().len(), 2);

        log.reset().unwrap();
        assert!(log.rows().unwrap().is_empty());

        log.append_row(ts, 5).unwrap();
        assert_eq!(
            log.rows().unwrap(),
            vec![CounterRow {
                timestamp: ts,
                object_count: 5
            }]
        );
    }

    #[test]
    fn failed_append_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("object_log.csv");
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        {
            let mut log = CounterLog::open(path.clone()).unwrap();
            log.append_row(ts, 4).unwrap();
        }
        let before = fs::read_to_string(&path).unwrap();

        // read-only handle: every write fails
        let mut log = CounterLog {
            path: path.clone(),
            file: File::open(&path).unwrap(),
        };
        let err = log.append_row(ts, 9).unwrap_err();
        assert!(format!("{err:#}").contains("failed to append"));

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(log.rows().unwrap().len(), 1);
    }

    #[test]
    fn rollback_removes_last_row() {
        let dir = TempDir::new().unwrap();
        let mut log = CounterLog::open(dir.path().join("object_log.csv")).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        log.append_row(ts, 1).unwrap();
        let before = log.append_row(ts, 2).unwrap();
        log.rollback_to(before).unwrap();

        let rows = log.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].object_count, 1);
    }
}
