mod aggregator;
mod types;

pub use aggregator::OnlineAggregator;
pub use types::{FrameMetrics, LiveStats, MetricsSnapshot, SystemMetrics};

use std::collections::VecDeque;
use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

const MAX_RECENT_FRAMES: usize = 20;

/// Session counters and a short window of per-frame timings.
///
/// Cloning shares the same state, so an observer can snapshot while the
/// capture loop records.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    recent_frames: VecDeque<FrameMetrics>,
    frames_processed: u64,
    frames_skipped: u64,
    records_rejected: u64,
    storage_failures: u64,
    system: System,
    pid: Pid,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // Initial refresh to establish baseline for CPU calculation
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                recent_frames: VecDeque::with_capacity(MAX_RECENT_FRAMES),
                frames_processed: 0,
                frames_skipped: 0,
                records_rejected: 0,
                storage_failures: 0,
                system,
                pid,
            })),
        }
    }

    pub async fn record_frame(&self, metrics: FrameMetrics) {
        let mut state = self.inner.lock().await;

        state.frames_processed += 1;
        state.records_rejected += metrics.rejected_records as u64;

        state.recent_frames.push_back(metrics);
        if state.recent_frames.len() > MAX_RECENT_FRAMES {
            state.recent_frames.pop_front();
        }
    }

    /// A frame the detection adapter failed on.
    pub async fn record_skipped_frame(&self) {
        self.inner.lock().await.frames_skipped += 1;
    }

    pub async fn record_storage_failure(&self) {
        self.inner.lock().await.storage_failures += 1;
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let mut state = self.inner.lock().await;
        let pid = state.pid;

        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        let system_metrics = match state.system.process(pid) {
            Some(process) => SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            },
            None => SystemMetrics {
                cpu_percent: 0.0,
                memory_mb: 0.0,
            },
        };

        MetricsSnapshot {
            system: system_metrics,
            recent_frames: state.recent_frames.iter().cloned().collect(),
            frames_processed: state.frames_processed,
            frames_skipped: state.frames_skipped,
            records_rejected: state.records_rejected,
            storage_failures: state.storage_failures,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn frame(seq: u64) -> FrameMetrics {
        FrameMetrics {
            frame_sequence: seq,
            timestamp: Utc::now(),
            acquire_ms: 1,
            detect_ms: 10,
            persist_ms: Some(2),
            total_ms: 13,
            object_count: 2,
            rejected_records: 1,
        }
    }

    #[tokio::test]
    async fn keeps_only_recent_frames() {
        let metrics = MetricsCollector::new();
        for seq in 0..(MAX_RECENT_FRAMES as u64 + 5) {
            metrics.record_frame(frame(seq)).await;
        }
        metrics.record_skipped_frame().await;
        metrics.record_storage_failure().await;

        let snapshot = metrics.get_snapshot().await;
        assert_eq!(snapshot.frames_processed, MAX_RECENT_FRAMES as u64 + 5);
        assert_eq!(snapshot.records_rejected, MAX_RECENT_FRAMES as u64 + 5);
        assert_eq!(snapshot.frames_skipped, 1);
        assert_eq!(snapshot.storage_failures, 1);
        assert_eq!(snapshot.recent_frames.len(), MAX_RECENT_FRAMES);
        assert_eq!(snapshot.recent_frames[0].frame_sequence, 5);
    }

    #[test]
    fn processing_fps_from_total_time() {
        let mut f = frame(0);
        f.total_ms = 50;
        assert_eq!(f.processing_fps(), Some(20.0));
        f.total_ms = 0;
        assert_eq!(f.processing_fps(), None);
    }
}
