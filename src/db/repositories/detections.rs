use anyhow::{Context, Result};
use rusqlite::{params, Row, Transaction};

use crate::db::{
    connection::Database,
    helpers::{column_opt_u64, column_time, column_u64, sql_int},
    models::{BoundingBox, EventRecord},
};

fn row_to_record(row: &Row) -> Result<EventRecord> {
    Ok(EventRecord {
        session_id: row.get("session_id")?,
        timestamp: column_time(row, "timestamp")?,
        frame_sequence: column_u64(row, "frame_id")?,
        class_label: row.get("object")?,
        confidence: row.get("confidence")?,
        bbox: BoundingBox {
            x: row.get("x")?,
            y: row.get("y")?,
            width: row.get("width")?,
            height: row.get("height")?,
        },
        track_id: column_opt_u64(row, "track_id")?,
    })
}

/// Insert one frame's rows inside the caller's transaction.
///
/// Nothing becomes visible until the caller commits.
pub(crate) fn insert_detection_rows(tx: &Transaction<'_>, records: &[EventRecord]) -> Result<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO detections (timestamp, frame_id, object, confidence, x, y, width, height, track_id, session_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;

    for record in records {
        stmt.execute(params![
            record.timestamp.to_rfc3339(),
            sql_int(record.frame_sequence)?,
            record.class_label,
            record.confidence,
            record.bbox.x,
            record.bbox.y,
            record.bbox.width,
            record.bbox.height,
            record.track_id.map(sql_int).transpose()?,
            record.session_id,
        ])
        .with_context(|| {
            format!(
                "failed to insert '{}' detection for frame {}",
                record.class_label, record.frame_sequence
            )
        })?;
    }

    Ok(())
}

impl Database {
    /// All rows of a session in frame order, then insertion order within a frame.
    pub async fn get_detections_for_session(&self, session_id: &str) -> Result<Vec<EventRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, frame_id, object, confidence, x, y, width, height, track_id, session_id
                 FROM detections
                 WHERE session_id = ?1
                 ORDER BY frame_id ASC, rowid ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    pub async fn count_detections(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM detections", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
