//! Offline report over a finished session's records.
//!
//! Reads only; never writes to the store. Run after the capture loop has left
//! `Running`.

pub mod datasets;
mod export;
mod report;

pub use datasets::{
    confidence_area, confidence_series, dominant_class_per_minute, frequency_table,
    presence_series, ClassFrequency, ConfidenceArea, ConfidencePoint, MinuteCount,
    MinuteDominant, PresenceSeries,
};
pub use export::{export_csv, write_report};
pub use report::{build_report, AnalyticsReport, PresenceReport};

use crate::db::Database;
use crate::error::AnalyticsError;

/// Load `session_id` from the database and build its report.
pub async fn report_for_session(
    db: &Database,
    session_id: &str,
    presence_class: &str,
) -> Result<AnalyticsReport, AnalyticsError> {
    let records = db
        .get_detections_for_session(session_id)
        .await
        .map_err(AnalyticsError::Load)?;
    build_report(session_id, &records, presence_class)
}
