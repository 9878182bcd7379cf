//! Error taxonomy for the capture pipeline.
//!
//! Only [`PipelineError::Initialization`] stops a session. Every other variant is
//! reported per frame, per record, or per report and the loop carries on.

use thiserror::Error;

/// A single detection that cannot become an [`EventRecord`](crate::db::EventRecord).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("geometry field `{field}` is not finite ({value})")]
    NonFiniteGeometry { field: &'static str, value: f64 },

    #[error("box size must be non-negative (width {width}, height {height})")]
    NegativeSize { width: f64, height: f64 },

    #[error("class label is empty")]
    EmptyLabel,

    #[error("class id {0} has no name")]
    UnknownClass(u32),
}

/// Failure while building the offline report. Never affects the capture session.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("session {0} has no records")]
    EmptySession(String),

    #[error("cannot bucket timestamp {timestamp} to the minute: {reason}")]
    MalformedBucket { timestamp: String, reason: String },

    #[error("failed to load session records: {0:#}")]
    Load(anyhow::Error),

    #[error("failed to export report: {0:#}")]
    Export(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Capture source, detector, or store could not be opened. Fatal.
    #[error("pipeline initialization failed: {0:#}")]
    Initialization(anyhow::Error),

    #[error("detection adapter failed on frame {frame_sequence}: {reason:#}")]
    DetectionAdapter {
        frame_sequence: u64,
        reason: anyhow::Error,
    },

    #[error("record rejected on frame {frame_sequence}: {error}")]
    Validation {
        frame_sequence: u64,
        error: ValidationError,
    },

    #[error("failed to persist frame {frame_sequence}: {reason:#}")]
    StorageWrite {
        frame_sequence: u64,
        reason: anyhow::Error,
    },

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("pipeline already terminated; start a new capture loop")]
    AlreadyTerminated,
}

impl PipelineError {
    /// True for the one class of error that prevents a session from starting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Initialization(_) | PipelineError::AlreadyTerminated
        )
    }
}
