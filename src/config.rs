use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

const DEBUG_ENV: &str = "DETLOG_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    pub db_path: PathBuf,
    pub counter_log_path: PathBuf,
    /// Keep tracker ids. When false the adapter is treated as a bare detector.
    pub tracking_enabled: bool,
    /// Write events to the store. When false only live feedback is produced.
    pub persistence_enabled: bool,
    /// Class whose per-minute presence is reported.
    pub presence_class: String,
    pub report_path: Option<PathBuf>,
    pub export_csv_path: Option<PathBuf>,
    /// The logging sink reports live stats every this many frames.
    pub feedback_log_every: u64,
    pub max_frames: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("detections.db"),
            counter_log_path: PathBuf::from("object_log.csv"),
            tracking_enabled: true,
            persistence_enabled: true,
            presence_class: "person".into(),
            report_path: None,
            export_csv_path: None,
            feedback_log_every: 30,
            max_frames: None,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing fields take their defaults; an unreadable
    /// or corrupt file falls back to the defaults entirely.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring invalid config {}: {err}", path.display());
                Self::default()
            })
        } else {
            Self::default()
        };

        Ok(config.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        let debug_mode = std::env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.feedback_log_every = 1;
        }
        self
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}
