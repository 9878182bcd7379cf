use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};

use super::report::AnalyticsReport;
use crate::db::EventRecord;

const EXPORT_HEADER: &str =
    "timestamp,frame_id,object,confidence,x,y,width,height,track_id,minute,area";

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Flat CSV of a session with the derived `minute` and `area` columns, for
/// spreadsheet and BI tools. Returns the number of rows written.
pub fn export_csv(records: &[EventRecord], path: &Path) -> Result<usize> {
    ensure_parent(path)?;
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{EXPORT_HEADER}")?;
    for record in records {
        let minute = record
            .minute_bucket()
            .with_context(|| format!("cannot bucket {}", record.timestamp))?;
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{}",
            record.timestamp.to_rfc3339(),
            record.frame_sequence,
            csv_field(&record.class_label),
            record.confidence,
            record.bbox.x,
            record.bbox.y,
            record.bbox.width,
            record.bbox.height,
            record.track_id.map(|id| id.to_string()).unwrap_or_default(),
            minute.to_rfc3339(),
            record.area(),
        )?;
    }
    out.flush()
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(records.len())
}

pub fn write_report(report: &AnalyticsReport, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let serialized = serde_json::to_string_pretty(report)?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::build_report;
    use crate::db::BoundingBox;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn records() -> Vec<EventRecord> {
        vec![
            EventRecord {
                session_id: "s1".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 4, 30).unwrap(),
                frame_sequence: 0,
                class_label: "traffic light".into(),
                confidence: 0.5,
                bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
                track_id: None,
            },
            EventRecord {
                session_id: "s1".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 1).unwrap(),
                frame_sequence: 1,
                class_label: "a,b".into(),
                confidence: 0.25,
                bbox: BoundingBox::new(0.0, 0.0, 2.0, 2.0),
                track_id: Some(9),
            },
        ]
    }

    #[test]
    fn csv_has_derived_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/detection_data.csv");

        let written = export_csv(&records(), &path).unwrap();
        assert_eq!(written, 2);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines[0], EXPORT_HEADER);
        assert_eq!(
            lines[1],
            "2024-05-01T10:04:30+00:00,0,traffic light,0.5,1,2,3,4,,2024-05-01T10:04:00+00:00,12"
        );
        assert!(lines[2].contains("\"a,b\""));
        assert!(lines[2].ends_with(",9,2024-05-01T10:05:00+00:00,4"));
    }

    #[test]
    fn report_round_trips_through_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let report = build_report("s1", &records(), "person").unwrap();

        write_report(&report, &path).unwrap();
        let loaded: AnalyticsReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, report);
    }
}
