use chrono::{DateTime, Utc};

use super::adapter::Detection;
use crate::db::EventRecord;
use crate::error::ValidationError;

/// A frame's detections turned into records. Invalid detections are dropped
/// individually and reported in `rejected`.
#[derive(Debug, Default)]
pub struct Normalized {
    pub records: Vec<EventRecord>,
    pub rejected: Vec<ValidationError>,
}

pub fn normalize_detections<F>(
    session_id: &str,
    frame_sequence: u64,
    timestamp: DateTime<Utc>,
    detections: Vec<Detection>,
    keep_track_ids: bool,
    class_name: F,
) -> Normalized
where
    F: Fn(u32) -> Option<String>,
{
    let mut normalized = Normalized::default();

    for detection in detections {
        let Some(class_label) = class_name(detection.class_id) else {
            normalized
                .rejected
                .push(ValidationError::UnknownClass(detection.class_id));
            continue;
        };

        let record = EventRecord {
            session_id: session_id.to_string(),
            timestamp,
            frame_sequence,
            class_label,
            confidence: detection.confidence,
            bbox: detection.bbox,
            track_id: if keep_track_ids {
                detection.track_id
            } else {
                None
            },
        };

        match record.validate() {
            Ok(()) => normalized.records.push(record),
            Err(err) => normalized.rejected.push(err),
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::BoundingBox;

    fn names(id: u32) -> Option<String> {
        match id {
            0 => Some("person".into()),
            2 => Some("car".into()),
            _ => None,
        }
    }

    fn detection(class_id: u32, confidence: f64, track_id: Option<u64>) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BoundingBox::new(50.0, 40.0, 10.0, 30.0),
            track_id,
        }
    }

    #[test]
    fn bad_detection_does_not_sink_the_frame() {
        let ts = Utc::now();
        let out = normalize_detections(
            "s",
            4,
            ts,
            vec![
                detection(0, 0.9, Some(1)),
                detection(2, 1.4, Some(2)),
                detection(9, 0.5, None),
                detection(2, 0.3, None),
            ],
            true,
            names,
        );

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].class_label, "person");
        assert_eq!(out.records[0].track_id, Some(1));
        assert_eq!(out.records[1].class_label, "car");
        assert!(out
            .records
            .iter()
            .all(|r| r.frame_sequence == 4 && r.timestamp == ts && r.session_id == "s"));
        assert_eq!(
            out.rejected,
            vec![
                ValidationError::ConfidenceOutOfRange(1.4),
                ValidationError::UnknownClass(9)
            ]
        );
    }

    #[test]
    fn track_ids_dropped_when_tracking_disabled() {
        let out = normalize_detections(
            "s",
            0,
            Utc::now(),
            vec![detection(0, 0.9, Some(11))],
            false,
            names,
        );
        assert_eq!(out.records[0].track_id, None);
    }
}
