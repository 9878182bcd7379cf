//! Column conversions. SQLite only has signed INTEGER and TEXT, while the
//! models use `u64` counters and UTC timestamps.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;

/// A counter as a SQLite INTEGER.
pub fn sql_int(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("{value} does not fit in a SQLite INTEGER"))
}

fn unsigned(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("column `{column}` holds negative value {value}"))
}

pub fn column_u64(row: &Row, column: &str) -> Result<u64> {
    unsigned(row.get(column)?, column)
}

pub fn column_opt_u64(row: &Row, column: &str) -> Result<Option<u64>> {
    let value: Option<i64> = row.get(column)?;
    value.map(|v| unsigned(v, column)).transpose()
}

pub fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("'{value}' is not an RFC 3339 timestamp"))
}

pub fn column_time(row: &Row, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    parse_rfc3339(&raw).with_context(|| format!("bad `{column}`"))
}

pub fn column_opt_time(row: &Row, column: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.as_deref()
        .map(parse_rfc3339)
        .transpose()
        .with_context(|| format!("bad `{column}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn negative_integers_are_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT -3 AS frames", [], |row| Ok(column_u64(row, "frames")))
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("`frames`"));

        let none = conn
            .query_row("SELECT NULL AS track_id", [], |row| {
                Ok(column_opt_u64(row, "track_id"))
            })
            .unwrap()
            .unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn timestamps_round_trip_through_text() {
        let now = Utc::now();
        assert_eq!(parse_rfc3339(&now.to_rfc3339()).unwrap(), now);
        assert!(parse_rfc3339("yesterday").is_err());
        assert!(sql_int(u64::MAX).is_err());
    }
}
