use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live values handed to the feedback sink once per frame. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    pub object_count: usize,
    /// Frames per second from the gap to the previous frame. `None` when the
    /// gap is zero.
    pub instantaneous_rate: Option<f64>,
    pub unique_object_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetrics {
    pub frame_sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub acquire_ms: u64,
    pub detect_ms: u64,
    pub persist_ms: Option<u64>,
    pub total_ms: u64,
    pub object_count: usize,
    pub rejected_records: usize,
}

impl FrameMetrics {
    /// Rate implied by this frame's own processing time.
    pub fn processing_fps(&self) -> Option<f64> {
        (self.total_ms > 0).then(|| 1000.0 / self.total_ms as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub recent_frames: Vec<FrameMetrics>,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub records_rejected: u64,
    pub storage_failures: u64,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            system: SystemMetrics {
                cpu_percent: 0.0,
                memory_mb: 0.0,
            },
            recent_frames: Vec::new(),
            frames_processed: 0,
            frames_skipped: 0,
            records_rejected: 0,
            storage_failures: 0,
        }
    }
}
