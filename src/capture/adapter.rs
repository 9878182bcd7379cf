//! Collaborators the capture loop drives but does not implement: the frame
//! source, the detector/tracker, and whatever renders live feedback.

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::db::BoundingBox;
use crate::metrics::LiveStats;
use crate::store::FrameBatch;

/// Raw raster frame as produced by the capture source.
pub type Frame = RgbImage;

/// One detector output before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f64,
    #[serde(flatten)]
    pub bbox: BoundingBox,
    #[serde(default)]
    pub track_id: Option<u64>,
}

pub trait CaptureSource: Send {
    /// Acquire the device or stream. Failure here stops the pipeline before it starts.
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Next frame, or `None` at end of stream. May block.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn release(&mut self) {}
}

pub trait DetectionAdapter: Send {
    /// Run detection (and tracking, if any) on one frame. May block.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    fn class_name(&self, class_id: u32) -> Option<&str>;
}

pub trait FeedbackSink: Send {
    /// Called once per processed frame with its batch and the live values.
    fn on_frame(&mut self, frame: &Frame, batch: &FrameBatch, stats: &LiveStats);

    /// Flush and release any output (window, encoder).
    fn close(&mut self) {}
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl FeedbackSink for NullSink {
    fn on_frame(&mut self, _frame: &Frame, _batch: &FrameBatch, _stats: &LiveStats) {}
}
