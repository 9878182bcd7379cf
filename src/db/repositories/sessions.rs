use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{column_opt_time, column_time, column_u64, sql_int},
    models::{Session, SessionStatus},
};

fn row_to_session(row: &Row) -> Result<Session> {
    let status: String = row.get("status")?;

    Ok(Session {
        id: row.get("id")?,
        started_at: column_time(row, "started_at")?,
        stopped_at: column_opt_time(row, "stopped_at")?,
        status: status.parse()?,
        frames_processed: column_u64(row, "frames_processed")?,
    })
}

impl Database {
    /// Wipe every stored session and detection, then record `session` as the
    /// only session. Runs as one transaction.
    pub async fn start_fresh_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM detections", [])
                .context("failed to clear detections")?;
            tx.execute("DELETE FROM sessions", [])
                .context("failed to clear sessions")?;
            tx.execute(
                "INSERT INTO sessions (id, started_at, stopped_at, status, frames_processed)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.started_at.to_rfc3339(),
                    record.stopped_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    sql_int(record.frames_processed)?,
                ],
            )
            .context("failed to insert session")?;
            tx.commit().context("failed to commit session reset")?;
            Ok(())
        })
        .await
    }

    pub async fn finish_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        frames_processed: u64,
        stopped_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = ?1,
                     frames_processed = ?2,
                     stopped_at = ?3
                 WHERE id = ?4",
                params![
                    status.as_str(),
                    sql_int(frames_processed)?,
                    stopped_at.to_rfc3339(),
                    session_id,
                ],
            )
            .context("failed to update session status")?;
            Ok(())
        })
        .await
    }

    /// The session currently held by the store, if any.
    pub async fn get_current_session(&self) -> Result<Option<Session>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, started_at, stopped_at, status, frames_processed
                 FROM sessions
                 ORDER BY started_at DESC
                 LIMIT 1",
            )?;

            let mut rows = stmt.query([])?;
            let session = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(session)
        })
        .await
    }
}
