use log::info;

use super::adapter::{FeedbackSink, Frame};
use crate::metrics::LiveStats;
use crate::store::FrameBatch;

/// Feedback sink for headless runs: logs the live values every `every` frames.
pub struct LoggingSink {
    every: u64,
    frames_seen: u64,
    last: Option<(u64, LiveStats)>,
}

impl LoggingSink {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            frames_seen: 0,
            last: None,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

fn describe(frame_sequence: u64, stats: &LiveStats) -> String {
    let rate = stats
        .instantaneous_rate
        .map(|fps| format!("{fps:.2}"))
        .unwrap_or_else(|| "-".into());
    format!(
        "frame {frame_sequence}: objects={} unique={} fps={rate}",
        stats.object_count, stats.unique_object_count
    )
}

impl FeedbackSink for LoggingSink {
    fn on_frame(&mut self, _frame: &Frame, batch: &FrameBatch, stats: &LiveStats) {
        self.frames_seen += 1;
        self.last = Some((batch.frame_sequence, *stats));

        if self.frames_seen % self.every == 0 {
            info!("{}", describe(batch.frame_sequence, stats));
        }
    }

    fn close(&mut self) {
        if let Some((frame_sequence, stats)) = self.last.take() {
            info!("final {}", describe(frame_sequence, &stats));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_formats_missing_rate() {
        let stats = LiveStats {
            object_count: 3,
            instantaneous_rate: None,
            unique_object_count: 2,
        };
        assert_eq!(describe(7, &stats), "frame 7: objects=3 unique=2 fps=-");

        let stats = LiveStats {
            instantaneous_rate: Some(29.974),
            ..stats
        };
        assert_eq!(describe(8, &stats), "frame 8: objects=3 unique=2 fps=29.97");
    }
}
