use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::{CaptureLoop, SessionSummary};
use crate::error::PipelineError;

/// Owns a capture loop running on its own task.
pub struct CaptureController {
    handle: Option<JoinHandle<Result<SessionSummary, PipelineError>>>,
    cancel_token: Option<CancellationToken>,
}

impl CaptureController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(&mut self, capture: CaptureLoop) -> Result<()> {
        if self.handle.is_some() {
            bail!("capture already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        info!("Starting capture session {}", capture.session_id());
        let handle = tokio::spawn(async move {
            let mut capture = capture;
            capture.run(token_clone).await
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Token that stops the running loop when cancelled, e.g. from a signal handler.
    pub fn cancel_token(&self) -> Option<CancellationToken> {
        self.cancel_token.clone()
    }

    /// Wait for the loop to finish on its own.
    pub async fn wait(&mut self) -> Result<SessionSummary> {
        let handle = self.handle.take().context("capture is not active")?;
        self.cancel_token = None;

        let summary = handle
            .await
            .context("capture loop task failed to join")??;
        Ok(summary)
    }

    /// Ask the loop to drain after the current frame and wait for it.
    pub async fn stop(&mut self) -> Result<SessionSummary> {
        if let Some(token) = &self.cancel_token {
            token.cancel();
            info!("Stop signal sent to capture loop");
        }
        self.wait().await
    }
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new()
    }
}
