//! Foreground coaching daemon over the stored sessions

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use coach_core::{
    CoachConfig, Daemon, PlannedTask, ScriptedSensors, SensorReading, SessionController,
};
use coach_storage::models::{FatigueLevel, FocusState};

use super::helpers::open_database;
use super::simulate::build_advisor;

/// One queued sensor sample; a missing side reads as unavailable
#[derive(Debug, Deserialize)]
pub struct QueuedReading {
    #[serde(default = "unavailable")]
    pub focus: SensorReading<FocusState>,
    #[serde(default = "unavailable")]
    pub fatigue: SensorReading<FatigueLevel>,
}

const fn unavailable<T>() -> SensorReading<T> {
    SensorReading::Unavailable
}

pub struct RunOptions {
    pub db: Option<PathBuf>,
    pub plan: Option<PathBuf>,
    pub user: String,
    pub readings: Option<PathBuf>,
}

pub async fn handle_run_command(options: RunOptions) -> Result<()> {
    let config = CoachConfig::load()?;
    let database = open_database(options.db)?;

    let sensors = Arc::new(ScriptedSensors::new());
    if let Some(path) = &options.readings {
        let readings = load_json::<Vec<QueuedReading>>(path, "readings")?;
        log::info!("Queued {} sensor readings from {}", readings.len(), path.display());
        for reading in readings {
            sensors.push(reading.focus, reading.fatigue).await;
        }
    }

    let advisor = build_advisor(&config).await?;
    let controller = Arc::new(SessionController::new(
        config,
        Arc::new(database),
        sensors.clone(),
        sensors,
        advisor,
    ));

    let plan = options
        .plan
        .as_deref()
        .map(|path| load_json::<Vec<PlannedTask>>(path, "plan"))
        .transpose()?;
    let live = load_sessions(&controller, &options.user, plan.as_deref()).await?;
    if live == 0 {
        log::warn!("No unfinished sessions to coach; pass --plan to start one");
    }

    println!("Coaching {live} sessions. Press Ctrl-C to stop.");
    Daemon::new(controller).run_with_signals().await
}

/// Resume stored sessions and optionally start a new one; returns how many are live
async fn load_sessions(
    controller: &SessionController,
    user: &str,
    plan: Option<&[PlannedTask]>,
) -> Result<usize> {
    let resumed = controller.resume_sessions().await?;
    let mut live = resumed;
    if let Some(plan) = plan {
        let session_id = controller.start_session(user, plan).await?;
        println!("Started session {session_id} for {user}");
        live += 1;
    }
    log::info!("Resumed {resumed} sessions, {live} live");
    Ok(live)
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {what} {}", path.display()))
}
