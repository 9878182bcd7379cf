//! Session-scoped event store.
//!
//! Structured rows go to the SQLite `detections` table; a per-frame
//! `timestamp,object_count` row goes to the counter log. Both are written
//! under the same transaction so a frame is either in both or in neither.

mod counter_log;

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

pub use counter_log::{CounterLog, CounterRow, COUNTER_LOG_HEADER};

use crate::db::{
    repositories::insert_detection_rows, Database, EventRecord, Session, SessionStatus,
};

/// Every record produced for one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBatch {
    pub frame_sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub records: Vec<EventRecord>,
}

impl FrameBatch {
    pub fn empty(frame_sequence: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            frame_sequence,
            timestamp,
            records: Vec::new(),
        }
    }

    pub fn object_count(&self) -> usize {
        self.records.len()
    }
}

pub struct EventStore {
    db: Database,
    counter_log: Arc<Mutex<CounterLog>>,
    session: Option<Session>,
    last_frame: Option<u64>,
    closed: bool,
}

impl EventStore {
    pub fn open(db_path: PathBuf, counter_log_path: PathBuf) -> Result<Self> {
        let db = Database::new(db_path)?;
        let counter_log = CounterLog::open(counter_log_path)?;

        Ok(Self {
            db,
            counter_log: Arc::new(Mutex::new(counter_log)),
            session: None,
            last_frame: None,
            closed: false,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Delete everything held by the store and begin a new session.
    ///
    /// Calling it again on a store that was just reset leaves it empty with a
    /// fresh session id.
    pub async fn reset_session(&mut self) -> Result<Session> {
        if let Some(previous) = self.db.get_current_session().await? {
            if previous.status == SessionStatus::Running {
                warn!(
                    "Session {} did not close cleanly ({} frames); discarding it",
                    previous.id, previous.frames_processed
                );
            }
        }

        let session = Session::start(Uuid::new_v4().to_string(), Utc::now());
        self.db
            .start_fresh_session(&session)
            .await
            .context("failed to reset detection store")?;

        lock_log(&self.counter_log)
            .reset()
            .context("failed to reset counter log")?;

        info!("Started capture session {}", session.id);

        self.session = Some(session.clone());
        self.last_frame = None;
        self.closed = false;
        Ok(session)
    }

    /// Persist one frame atomically. Returns the number of rows written.
    ///
    /// The whole batch is refused if any record is invalid, belongs to another
    /// frame or session, or if the frame does not come after the last one stored.
    pub async fn append_frame(&mut self, batch: FrameBatch) -> Result<usize> {
        let session_id = self.writable_session()?.id.clone();

        if let Some(last) = self.last_frame {
            if batch.frame_sequence <= last {
                bail!(
                    "frame {} is not after last stored frame {last}",
                    batch.frame_sequence
                );
            }
        }

        for record in &batch.records {
            if record.frame_sequence != batch.frame_sequence {
                bail!(
                    "record for frame {} submitted in batch for frame {}",
                    record.frame_sequence,
                    batch.frame_sequence
                );
            }
            if record.session_id != session_id {
                bail!("record belongs to session {}", record.session_id);
            }
            record.validate().with_context(|| {
                format!(
                    "invalid '{}' record in frame {}",
                    record.class_label, batch.frame_sequence
                )
            })?;
        }

        let frame_sequence = batch.frame_sequence;
        let counter_log = Arc::clone(&self.counter_log);
        let written = self
            .db
            .execute(move |conn| {
                let tx = conn.transaction()?;
                insert_detection_rows(&tx, &batch.records)?;

                let mut log = lock_log(&counter_log);
                let rollback_len = log.append_row(batch.timestamp, batch.object_count())?;
                if let Err(err) = tx.commit() {
                    log.rollback_to(rollback_len)?;
                    return Err(anyhow::Error::new(err).context("failed to commit frame"));
                }

                Ok(batch.records.len())
            })
            .await
            .with_context(|| format!("failed to persist frame {frame_sequence}"))?;

        self.last_frame = Some(frame_sequence);
        Ok(written)
    }

    /// Persist a single record as a frame of its own.
    pub async fn append(&mut self, record: EventRecord) -> Result<usize> {
        let batch = FrameBatch {
            frame_sequence: record.frame_sequence,
            timestamp: record.timestamp,
            records: vec![record],
        };
        self.append_frame(batch).await
    }

    /// Every record of `session_id`, ordered by frame then insertion.
    pub async fn query_all(&self, session_id: &str) -> Result<Vec<EventRecord>> {
        self.db.get_detections_for_session(session_id).await
    }

    /// Stop accepting writes and stamp the session row.
    pub async fn close(&mut self, status: SessionStatus, frames_processed: u64) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let Some(session) = self.session.as_mut() else {
            self.closed = true;
            return Ok(());
        };

        let stopped_at = Utc::now();
        self.db
            .finish_session(&session.id, status, frames_processed, stopped_at)
            .await?;

        session.status = status;
        session.frames_processed = frames_processed;
        session.stopped_at = Some(stopped_at);
        self.closed = true;

        info!(
            "Closed capture session {} as {} after {} frames",
            session.id,
            status.as_str(),
            frames_processed
        );
        Ok(())
    }

    pub fn counter_rows(&self) -> Result<Vec<CounterRow>> {
        lock_log(&self.counter_log).rows()
    }

    fn writable_session(&self) -> Result<&Session> {
        if self.closed {
            bail!("event store session is closed");
        }
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("event store has no active session; call reset_session first"))
    }
}

fn lock_log(log: &Mutex<CounterLog>) -> std::sync::MutexGuard<'_, CounterLog> {
    match log.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
