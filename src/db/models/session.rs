//! Session data model.
//!
//! A session is one capture-loop run. The store holds at most one session at a
//! time; starting a new one wipes the previous one.

use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Running,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "Running",
            SessionStatus::Completed => "Completed",
            SessionStatus::Interrupted => "Interrupted",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [
            SessionStatus::Running,
            SessionStatus::Completed,
            SessionStatus::Interrupted,
        ]
        .into_iter()
        .find(|status| status.as_str() == value)
        .ok_or_else(|| anyhow!("unknown session status '{value}'"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub frames_processed: u64,
}

impl Session {
    pub fn start(id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            stopped_at: None,
            status: SessionStatus::Running,
            frames_processed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_its_own_names() {
        for status in [
            SessionStatus::Running,
            SessionStatus::Completed,
            SessionStatus::Interrupted,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("Cancelled".parse::<SessionStatus>().is_err());
    }
}
