use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    time::Instant,
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::adapter::{CaptureSource, Detection, DetectionAdapter, FeedbackSink, Frame};
use super::normalize::normalize_detections;
use super::state::PipelineState;
use crate::{
    analytics::{self, AnalyticsReport},
    config::PipelineConfig,
    db::SessionStatus,
    error::{AnalyticsError, PipelineError},
    metrics::{FrameMetrics, MetricsCollector, MetricsSnapshot, OnlineAggregator},
    store::{EventStore, FrameBatch},
    tracking::TrackRegistry,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

type Clock = Box<dyn FnMut() -> DateTime<Utc> + Send>;

/// What a finished session leaves behind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub frames_processed: u64,
    pub records_persisted: u64,
    pub unique_objects: usize,
    pub metrics: MetricsSnapshot,
    pub report: Option<AnalyticsReport>,
}

/// One capture session: pull frame, detect, normalize, track, persist, feed back.
///
/// A loop runs once. After [`CaptureLoop::run`] returns it is `Terminated`, and a
/// new session needs a new loop (which resets the store again).
pub struct CaptureLoop {
    config: PipelineConfig,
    state: PipelineState,
    session_id: String,
    source: Option<Box<dyn CaptureSource>>,
    detector: Option<Box<dyn DetectionAdapter>>,
    sink: Box<dyn FeedbackSink>,
    store: Option<EventStore>,
    registry: TrackRegistry,
    aggregator: OnlineAggregator,
    metrics: MetricsCollector,
    clock: Clock,
    next_frame_sequence: u64,
    records_persisted: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl CaptureLoop {
    /// Open the capture source and reset the event store. Any failure is fatal.
    pub async fn initialize(
        config: PipelineConfig,
        source: Box<dyn CaptureSource>,
        detector: Box<dyn DetectionAdapter>,
        sink: Box<dyn FeedbackSink>,
    ) -> Result<Self, PipelineError> {
        let mut source = tokio::task::spawn_blocking(move || {
            let mut source = source;
            match source.open() {
                Ok(()) => Ok(source),
                Err(err) => {
                    source.release();
                    Err(err)
                }
            }
        })
        .await
        .context("capture source worker join failed")
        .and_then(|opened| opened.context("failed to open capture source"))
        .map_err(PipelineError::Initialization)?;

        let (store, session_id) = if config.persistence_enabled {
            match open_store(&config).await {
                Ok((store, session_id)) => (Some(store), session_id),
                Err(err) => {
                    source.release();
                    return Err(PipelineError::Initialization(err));
                }
            }
        } else {
            (None, Uuid::new_v4().to_string())
        };

        let mut registry = TrackRegistry::new();
        registry.reset();

        log_info!(
            "Capture loop initialized for session {} (tracking={}, persistence={})",
            session_id,
            config.tracking_enabled,
            config.persistence_enabled
        );

        Ok(Self {
            config,
            state: PipelineState::Initializing,
            session_id,
            source: Some(source),
            detector: Some(detector),
            sink,
            store,
            registry,
            aggregator: OnlineAggregator::new(),
            metrics: MetricsCollector::new(),
            clock: Box::new(Utc::now),
            next_frame_sequence: 0,
            records_persisted: 0,
            last_timestamp: None,
        })
    }

    /// Replace the wall clock used to stamp frames.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: FnMut() -> DateTime<Utc> + Send + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }

    pub fn store(&self) -> Option<&EventStore> {
        self.store.as_ref()
    }

    /// Process frames until the source ends, fails, or `cancel` fires, then drain.
    ///
    /// Cancellation is checked once per frame, so the frame in flight is always
    /// fully persisted or fully dropped before shutdown.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<SessionSummary, PipelineError> {
        if self.state != PipelineState::Initializing {
            return Err(PipelineError::AlreadyTerminated);
        }
        self.advance(PipelineState::Running);

        let status = loop {
            if cancel.is_cancelled() {
                log_info!("Stop requested; draining session {}", self.session_id);
                break SessionStatus::Completed;
            }
            if let Some(max) = self.config.max_frames {
                if self.next_frame_sequence >= max {
                    log_info!("Reached frame limit {max}; draining session {}", self.session_id);
                    break SessionStatus::Completed;
                }
            }

            let started = Instant::now();
            match self.acquire_frame().await {
                Ok(Some(frame)) => self.process_frame(frame, started).await,
                Ok(None) => {
                    log_info!("Capture source reached end of stream");
                    break SessionStatus::Completed;
                }
                Err(err) => {
                    log_error!("Capture source failed: {err:#}");
                    break SessionStatus::Interrupted;
                }
            }
        };

        Ok(self.drain(status).await)
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state.as_str(),
            next.as_str()
        );
        log::debug!("Capture loop {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
    }

    async fn acquire_frame(&mut self) -> Result<Option<Frame>> {
        let mut source = self
            .source
            .take()
            .ok_or_else(|| anyhow!("capture source is not available"))?;

        let (source, frame) = tokio::task::spawn_blocking(move || {
            let frame = source.next_frame();
            (source, frame)
        })
        .await
        .context("capture source worker join failed")?;

        self.source = Some(source);
        frame
    }

    async fn detect(&mut self, frame: Frame) -> Result<(Frame, Vec<Detection>)> {
        let mut detector = self
            .detector
            .take()
            .ok_or_else(|| anyhow!("detector is not available"))?;

        // A panicking adapter costs its frame only; the detector is handed back.
        let (detector, frame, detections) = tokio::task::spawn_blocking(move || {
            let detections = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&frame)))
                .unwrap_or_else(|payload| {
                    Err(anyhow!("detector panicked: {}", panic_message(payload.as_ref())))
                });
            (detector, frame, detections)
        })
        .await
        .context("detector worker join failed")?;

        self.detector = Some(detector);
        Ok((frame, detections?))
    }

    /// Frame timestamps never go backwards, even if the wall clock does.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = (self.clock)();
        let timestamp = match self.last_timestamp {
            Some(last) if now < last => last,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }

    async fn process_frame(&mut self, frame: Frame, started: Instant) {
        let acquire_ms = started.elapsed().as_millis() as u64;
        let frame_sequence = self.next_frame_sequence;

        let detect_start = Instant::now();
        let (frame, detections) = match self.detect(frame).await {
            Ok(output) => output,
            Err(reason) => {
                let err = PipelineError::DetectionAdapter {
                    frame_sequence,
                    reason,
                };
                log_warn!("{err}; skipping frame");
                self.metrics.record_skipped_frame().await;
                return;
            }
        };
        let detect_ms = detect_start.elapsed().as_millis() as u64;

        let timestamp = self.next_timestamp();
        self.next_frame_sequence += 1;

        let normalized = {
            let detector = self.detector.as_deref();
            normalize_detections(
                &self.session_id,
                frame_sequence,
                timestamp,
                detections,
                self.config.tracking_enabled,
                |class_id| {
                    detector
                        .and_then(|d| d.class_name(class_id))
                        .map(str::to_owned)
                },
            )
        };

        for error in &normalized.rejected {
            let err = PipelineError::Validation {
                frame_sequence,
                error: error.clone(),
            };
            log_warn!("{err}");
        }

        for track_id in normalized.records.iter().filter_map(|r| r.track_id) {
            self.registry.observe(track_id);
        }

        let rejected_records = normalized.rejected.len();
        let batch = FrameBatch {
            frame_sequence,
            timestamp,
            records: normalized.records,
        };

        let persist_ms = match self.store.as_mut() {
            Some(store) => {
                let persist_start = Instant::now();
                match store.append_frame(batch.clone()).await {
                    Ok(written) => self.records_persisted += written as u64,
                    Err(reason) => {
                        let err = PipelineError::StorageWrite {
                            frame_sequence,
                            reason,
                        };
                        log_error!("{err}; live feedback continues");
                        self.metrics.record_storage_failure().await;
                    }
                }
                Some(persist_start.elapsed().as_millis() as u64)
            }
            None => None,
        };

        let stats = self
            .aggregator
            .update(timestamp, batch.object_count(), self.registry.count());
        self.sink.on_frame(&frame, &batch, &stats);

        self.metrics
            .record_frame(FrameMetrics {
                frame_sequence,
                timestamp,
                acquire_ms,
                detect_ms,
                persist_ms,
                total_ms: started.elapsed().as_millis() as u64,
                object_count: batch.object_count(),
                rejected_records,
            })
            .await;
    }

    async fn drain(&mut self, status: SessionStatus) -> SessionSummary {
        self.advance(PipelineState::Draining);

        if let Some(mut source) = self.source.take() {
            source.release();
        }
        self.detector = None;
        self.sink.close();

        let frames_processed = self.next_frame_sequence;
        let mut report = None;

        if let Some(store) = self.store.as_mut() {
            if let Err(err) = store.close(status, frames_processed).await {
                log_error!("Failed to close session {}: {err:#}", self.session_id);
            }

            match generate_report(store, &self.session_id, &self.config).await {
                Ok(generated) => report = Some(generated),
                Err(err) => log_warn!("No report for session {}: {err}", self.session_id),
            }
        }

        let metrics = self.metrics.get_snapshot().await;
        self.advance(PipelineState::Terminated);

        log_info!(
            "Session {} finished: {} frames, {} records, {} unique objects",
            self.session_id,
            frames_processed,
            self.records_persisted,
            self.registry.count()
        );

        SessionSummary {
            session_id: self.session_id.clone(),
            status,
            frames_processed,
            records_persisted: self.records_persisted,
            unique_objects: self.registry.count(),
            metrics,
            report,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

async fn open_store(config: &PipelineConfig) -> Result<(EventStore, String)> {
    let mut store = EventStore::open(config.db_path.clone(), config.counter_log_path.clone())
        .context("failed to open event store")?;
    let session = store.reset_session().await?;
    Ok((store, session.id))
}

/// Build the report and write any configured exports. Export failures are
/// logged; the report is still returned.
async fn generate_report(
    store: &EventStore,
    session_id: &str,
    config: &PipelineConfig,
) -> Result<AnalyticsReport, AnalyticsError> {
    let records = store
        .query_all(session_id)
        .await
        .map_err(AnalyticsError::Load)?;
    let report = analytics::build_report(session_id, &records, &config.presence_class)?;

    if let Some(path) = &config.report_path {
        match analytics::write_report(&report, path) {
            Ok(()) => log_info!("Report written to {}", path.display()),
            Err(err) => log_warn!("{}", AnalyticsError::Export(err)),
        }
    }
    if let Some(path) = &config.export_csv_path {
        match analytics::export_csv(&records, path) {
            Ok(rows) => log_info!("Exported {rows} records to {}", path.display()),
            Err(err) => log_warn!("{}", AnalyticsError::Export(err)),
        }
    }

    Ok(report)
}
