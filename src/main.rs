use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use detlog_lib::{
    analytics,
    capture::{replay::load_replay, CaptureController, CaptureLoop, LoggingSink},
    config::PipelineConfig,
    db::Database,
    utils::init_logging,
};

/// Detection-event capture and analytics.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline config (JSON). Missing file means defaults.
    #[arg(short, long, global = true, default_value = "detlog.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a capture session over a recorded detection file.
    Replay {
        /// JSON lines: a classes header, then one detection array per frame.
        file: PathBuf,
    },
    /// Rebuild the report for the last stored session.
    Report,
    /// Write the effective config (defaults plus any existing values) to --config.
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let config = PipelineConfig::load(&args.config)?;

    match args.command {
        Command::Replay { file } => replay(config, file).await,
        Command::Report => report(config).await,
        Command::InitConfig => {
            config.save(&args.config)?;
            info!("Config written to {}", args.config.display());
            Ok(())
        }
    }
}

async fn replay(config: PipelineConfig, file: PathBuf) -> Result<()> {
    let recording = load_replay(&file)?;
    let sink = LoggingSink::new(config.feedback_log_every);

    let capture = CaptureLoop::initialize(
        config,
        Box::new(recording.source),
        Box::new(recording.detector),
        Box::new(sink),
    )
    .await?;

    let mut controller = CaptureController::new();
    controller.start(capture)?;

    if let Some(token) = controller.cancel_token() {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping after the current frame");
                    token.cancel();
                }
                Err(err) => warn!("Failed to listen for Ctrl-C: {err}"),
            }
        });
    }

    let summary = controller.wait().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn report(config: PipelineConfig) -> Result<()> {
    let db = Database::new(config.db_path.clone())?;
    let session = db
        .get_current_session()
        .await?
        .context("no session has been recorded yet")?;

    let report = analytics::report_for_session(&db, &session.id, &config.presence_class).await?;

    if let Some(path) = &config.report_path {
        analytics::write_report(&report, path)?;
        info!("Report written to {}", path.display());
    }
    if let Some(path) = &config.export_csv_path {
        let records = db.get_detections_for_session(&session.id).await?;
        let rows = analytics::export_csv(&records, path)?;
        info!("Exported {rows} records to {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
