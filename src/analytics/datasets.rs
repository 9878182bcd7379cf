//! The five report datasets. Each is a pure function of a session's records in
//! store order.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::db::EventRecord;
use crate::error::AnalyticsError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassFrequency {
    pub class_label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidencePoint {
    pub timestamp: DateTime<Utc>,
    pub class_label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinuteDominant {
    pub minute: DateTime<Utc>,
    pub class_label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceArea {
    pub confidence: f64,
    pub area: f64,
    pub class_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinuteCount {
    pub minute: DateTime<Utc>,
    pub count: usize,
}

/// Per-minute count of one class. `NotObserved` is distinct from a series of zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PresenceSeries {
    NotObserved,
    Observed { points: Vec<MinuteCount> },
}

impl PresenceSeries {
    pub fn is_observed(&self) -> bool {
        matches!(self, PresenceSeries::Observed { .. })
    }
}

fn minute_of(record: &EventRecord) -> Result<DateTime<Utc>, AnalyticsError> {
    record
        .minute_bucket()
        .map_err(|err| AnalyticsError::MalformedBucket {
            timestamp: record.timestamp.to_rfc3339(),
            reason: err.to_string(),
        })
}

/// Count per label in first-seen order.
fn count_by_label<'a>(records: impl Iterator<Item = &'a EventRecord>) -> Vec<(&'a str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let label = record.class_label.as_str();
        match index.get(label) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(label, counts.len());
                counts.push((label, 1));
            }
        }
    }

    counts
}

/// Records per class, most frequent first. Ties keep first-seen order.
pub fn frequency_table(records: &[EventRecord]) -> Vec<ClassFrequency> {
    let mut counts = count_by_label(records.iter());
    // stable: equal counts stay in first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .map(|(label, count)| ClassFrequency {
            class_label: label.to_string(),
            count,
        })
        .collect()
}

pub fn confidence_series(records: &[EventRecord]) -> Vec<ConfidencePoint> {
    let mut points: Vec<ConfidencePoint> = records
        .iter()
        .map(|r| ConfidencePoint {
            timestamp: r.timestamp,
            class_label: r.class_label.clone(),
            confidence: r.confidence,
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

/// Most frequent class in each minute that has records. Empty minutes are omitted.
pub fn dominant_class_per_minute(
    records: &[EventRecord],
) -> Result<Vec<MinuteDominant>, AnalyticsError> {
    let mut buckets: BTreeMap<DateTime<Utc>, Vec<&EventRecord>> = BTreeMap::new();
    for record in records {
        buckets.entry(minute_of(record)?).or_default().push(record);
    }

    let mut dominant = Vec::with_capacity(buckets.len());
    for (minute, bucket) in buckets {
        let mut best: Option<(&str, usize)> = None;
        for (label, count) in count_by_label(bucket.into_iter()) {
            // strictly greater, so the first-encountered class wins a tie
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((label, count));
            }
        }

        if let Some((label, count)) = best {
            dominant.push(MinuteDominant {
                minute,
                class_label: label.to_string(),
                count,
            });
        }
    }

    Ok(dominant)
}

pub fn confidence_area(records: &[EventRecord]) -> Vec<ConfidenceArea> {
    records
        .iter()
        .map(|r| ConfidenceArea {
            confidence: r.confidence,
            area: r.area(),
            class_label: r.class_label.clone(),
        })
        .collect()
}

/// Per-minute count of `class_label`, zero-filled across the whole session span.
pub fn presence_series(
    records: &[EventRecord],
    class_label: &str,
) -> Result<PresenceSeries, AnalyticsError> {
    if !records.iter().any(|r| r.class_label == class_label) {
        return Ok(PresenceSeries::NotObserved);
    }

    let mut counts: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
    let mut first: Option<DateTime<Utc>> = None;
    let mut last: Option<DateTime<Utc>> = None;

    for record in records {
        let minute = minute_of(record)?;
        first = Some(first.map_or(minute, |m| m.min(minute)));
        last = Some(last.map_or(minute, |m| m.max(minute)));
        if record.class_label == class_label {
            *counts.entry(minute).or_insert(0) += 1;
        }
    }

    let (Some(first), Some(last)) = (first, last) else {
        return Ok(PresenceSeries::NotObserved);
    };

    let mut points = Vec::new();
    let mut minute = first;
    while minute <= last {
        points.push(MinuteCount {
            minute,
            count: counts.get(&minute).copied().unwrap_or(0),
        });
        minute += TimeDelta::minutes(1);
    }

    Ok(PresenceSeries::Observed { points })
}
