//! Event record data model.
//!
//! One detected object instance in one processed frame. Records are written once
//! and only ever removed together when a new session resets the store.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Center-based box geometry in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteGeometry { field, value });
            }
        }

        if self.width < 0.0 || self.height < 0.0 {
            return Err(ValidationError::NegativeSize {
                width: self.width,
                height: self.height,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub frame_sequence: u64,
    pub class_label: String,
    pub confidence: f64,
    #[serde(flatten)]
    pub bbox: BoundingBox,
    /// Present only when a tracker produced the detection.
    pub track_id: Option<u64>,
}

impl EventRecord {
    pub fn area(&self) -> f64 {
        self.bbox.area()
    }

    /// Timestamp floored to the minute.
    pub fn minute_bucket(&self) -> Result<DateTime<Utc>, chrono::RoundingError> {
        floor_to_minute(self.timestamp)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ValidationError::ConfidenceOutOfRange(self.confidence));
        }
        if self.class_label.trim().is_empty() {
            return Err(ValidationError::EmptyLabel);
        }
        self.bbox.validate()
    }
}

pub fn floor_to_minute(timestamp: DateTime<Utc>) -> Result<DateTime<Utc>, chrono::RoundingError> {
    timestamp.duration_trunc(TimeDelta::minutes(1))
}
