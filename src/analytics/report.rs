use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::datasets::{
    confidence_area, confidence_series, dominant_class_per_minute, frequency_table,
    presence_series, ClassFrequency, ConfidenceArea, ConfidencePoint, MinuteDominant,
    PresenceSeries,
};
use crate::db::EventRecord;
use crate::error::AnalyticsError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceReport {
    pub class_label: String,
    pub series: PresenceSeries,
}

/// Everything a report renderer needs for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub session_id: String,
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,
    pub frequency: Vec<ClassFrequency>,
    pub confidence_series: Vec<ConfidencePoint>,
    pub dominant_per_minute: Vec<MinuteDominant>,
    pub confidence_area: Vec<ConfidenceArea>,
    pub presence: PresenceReport,
}

pub fn build_report(
    session_id: &str,
    records: &[EventRecord],
    presence_class: &str,
) -> Result<AnalyticsReport, AnalyticsError> {
    if records.is_empty() {
        return Err(AnalyticsError::EmptySession(session_id.to_string()));
    }

    Ok(AnalyticsReport {
        session_id: session_id.to_string(),
        generated_at: Utc::now(),
        total_records: records.len(),
        frequency: frequency_table(records),
        confidence_series: confidence_series(records),
        dominant_per_minute: dominant_class_per_minute(records)?,
        confidence_area: confidence_area(records),
        presence: PresenceReport {
            class_label: presence_class.to_string(),
            series: presence_series(records, presence_class)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::BoundingBox;
    use chrono::TimeZone;

    #[test]
    fn empty_session_is_an_error() {
        let err = build_report("abc", &[], "person").unwrap_err();
        assert!(matches!(err, AnalyticsError::EmptySession(id) if id == "abc"));
    }

    #[test]
    fn report_bundles_all_datasets() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 3).unwrap();
        let records = vec![EventRecord {
            session_id: "abc".into(),
            timestamp: ts,
            frame_sequence: 0,
            class_label: "car".into(),
            confidence: 0.7,
            bbox: BoundingBox::new(5.0, 5.0, 4.0, 2.0),
            track_id: Some(1),
        }];

        let report = build_report("abc", &records, "person").unwrap();
        assert_eq!(report.total_records, 1);
        assert_eq!(report.frequency[0].class_label, "car");
        assert_eq!(report.confidence_series.len(), 1);
        assert_eq!(report.dominant_per_minute[0].class_label, "car");
        assert_eq!(report.confidence_area[0].area, 8.0);
        assert_eq!(report.presence.class_label, "person");
        assert!(!report.presence.series.is_observed());
    }

    #[test]
    fn presence_serializes_with_status_tag() {
        let json = serde_json::to_value(PresenceSeries::NotObserved).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "notObserved" }));
    }
}
