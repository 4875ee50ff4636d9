use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::warn;
use serde::Deserialize;
use serde_json::json;

use guidepost_lib::models::{AlertMode, Detection, FeedbackEvent, StationarySignal};
use guidepost_lib::utils::init_logging;
use guidepost_lib::{AlertDecisionPipeline, Database, EngineSettings, SettingsStore, SystemClock};

#[derive(Parser)]
#[command(
    name = "guidepost",
    about = "Replay detection frames through the alert decision engine"
)]
struct Cli {
    /// JSON-lines file of frames; `-` reads stdin
    #[arg(value_name = "FRAMES", default_value = "-")]
    input: String,

    /// SQLite database for preferences and zone configs (in-memory when omitted)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// User whose profile is loaded and updated
    #[arg(long, default_value = "default")]
    user: String,

    /// Engine settings JSON file
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Starting alert mode
    #[arg(long, value_enum, default_value_t = ModeArg::Normal)]
    mode: ModeArg,

    /// Pretty-print each outcome
    #[arg(long)]
    pretty: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Normal,
    Quiet,
    Walking,
    Scanning,
}

impl From<ModeArg> for AlertMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Normal => AlertMode::Normal,
            ModeArg::Quiet => AlertMode::Quiet,
            ModeArg::Walking => AlertMode::Walking,
            ModeArg::Scanning => AlertMode::Scanning,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FrameCommand {
    Reset,
    Expand,
    Collapse,
}

/// One camera frame plus whatever the user said since the last one.
#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(default)]
    detections: Vec<Detection>,
    #[serde(default)]
    stationary: StationarySignal,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    feedback: Vec<FeedbackEvent>,
    #[serde(default)]
    command: Option<FrameCommand>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => SettingsStore::new(path.clone())?.engine(),
        None => EngineSettings::default(),
    };

    let db = match &cli.db {
        Some(path) => Database::new(path.clone()),
        None => Database::in_memory(),
    };
    let db = match db {
        Ok(db) => Some(db),
        Err(err) => {
            warn!("Running without persistence: {err:#}");
            None
        }
    };

    let mut pipeline =
        AlertDecisionPipeline::open(db, cli.user.clone(), settings, Arc::new(SystemClock)).await;
    pipeline.set_mode(cli.mode.into());

    let reader: Box<dyn BufRead> = if cli.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&cli.input)
            .with_context(|| format!("failed to open frames file {}", cli.input))?;
        Box::new(BufReader::new(file))
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("failed to read frame")?;
        if line.trim().is_empty() {
            continue;
        }

        let frame: Frame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Skipping frame {}: {err}", index + 1);
                continue;
            }
        };

        let mut spoken = Vec::new();
        if let Some(mode) = frame.mode.as_deref() {
            match pipeline.apply_mode_command(mode) {
                Ok(confirmation) => spoken.push(confirmation.to_string()),
                Err(err) => warn!("Frame {}: {err}", index + 1),
            }
        }
        match frame.command {
            Some(FrameCommand::Reset) => spoken.push(pipeline.reset().to_string()),
            Some(FrameCommand::Expand) => spoken.push(pipeline.expand(None).message),
            Some(FrameCommand::Collapse) => spoken.push(pipeline.collapse()),
            None => {}
        }
        for event in &frame.feedback {
            pipeline.record_feedback(event);
        }

        let zones = pipeline.zone_summary(&frame.detections);
        let outcome = pipeline.process_batch(&frame.detections, frame.stationary);
        let report = json!({
            "frame": index + 1,
            "spoken": spoken,
            "outcome": outcome,
            "zones": zones,
            "status": pipeline.status(),
        });

        let rendered = if cli.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        writeln!(out, "{rendered}")?;
    }

    Ok(())
}
