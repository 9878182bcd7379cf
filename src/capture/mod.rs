mod adapter;
mod controller;
mod loop_worker;
mod normalize;
pub mod replay;
mod sink;
mod state;

pub use adapter::{CaptureSource, Detection, DetectionAdapter, FeedbackSink, Frame, NullSink};
pub use controller::CaptureController;
pub use loop_worker::{CaptureLoop, SessionSummary};
pub use normalize::{normalize_detections, Normalized};
pub use sink::LoggingSink;
pub use state::PipelineState;
