pub mod analytics;
pub mod capture;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod store;
pub mod tracking;
pub mod utils;

pub use capture::{CaptureController, CaptureLoop, PipelineState, SessionSummary};
pub use config::PipelineConfig;
pub use error::{AnalyticsError, PipelineError, ValidationError};
pub use store::EventStore;
