//! Scripted session playback: feeds recorded sensor readings and learner
//! responses through the session controller, one tick at a time.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};

use coach_ai::{Advisor, DisabledAdvisor, LlmAdvisor};
use coach_core::{CoachConfig, PlannedTask, ScriptedSensors, SensorReading, SessionController};
use coach_storage::models::{FatigueLevel, FocusState, ResponseOutcome, SessionState, TaskStatus};
use coach_storage::Database;
use uuid::Uuid;

use super::helpers::{open_database, print_heading, truncate_str};
use super::session::{print_schedule, DecisionRow};

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_user")]
    pub user_id: String,
    pub plan: Vec<PlannedTask>,
    pub ticks: Vec<ScenarioTick>,
}

/// One sampling period of the script
#[derive(Debug, Deserialize)]
pub struct ScenarioTick {
    #[serde(default = "unavailable")]
    pub focus: SensorReading<FocusState>,
    #[serde(default = "unavailable")]
    pub fatigue: SensorReading<FatigueLevel>,
    /// Run a decision tick after sampling
    #[serde(default = "default_true")]
    pub decide: bool,
    /// Learner's answer, applied after the decision
    #[serde(default)]
    pub response: Option<ResponseOutcome>,
    /// Finish whatever task is running
    #[serde(default)]
    pub complete_active: bool,
    #[serde(default)]
    pub do_not_disturb: Option<bool>,
}

fn default_user() -> String {
    "learner".to_string()
}

const fn unavailable<T>() -> SensorReading<T> {
    SensorReading::Unavailable
}

const fn default_true() -> bool {
    true
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }
}

#[derive(Tabled)]
struct TickRow {
    #[tabled(rename = "Tick")]
    tick: usize,
    #[tabled(rename = "Focus")]
    focus: String,
    #[tabled(rename = "Fatigue")]
    fatigue: String,
    #[tabled(rename = "Decision")]
    decision: String,
    #[tabled(rename = "Ignored")]
    ignore_count: u32,
    #[tabled(rename = "State")]
    state: String,
}

pub async fn handle_simulate_command(
    scenario_path: &Path,
    db_path: Option<PathBuf>,
    persist: bool,
) -> Result<()> {
    let scenario = Scenario::load(scenario_path)?;
    let config = CoachConfig::load()?;
    let database = if persist || db_path.is_some() {
        open_database(db_path)?
    } else {
        Database::open_in_memory()?
    };

    let sensors = Arc::new(ScriptedSensors::new());
    let advisor = build_advisor(&config).await?;
    let controller = SessionController::new(
        config,
        Arc::new(database),
        sensors.clone(),
        sensors.clone(),
        advisor,
    );

    let session_id = controller
        .start_session(&scenario.user_id, &scenario.plan)
        .await?;
    let rows = play(&controller, &sensors, session_id, scenario.ticks).await?;

    print_heading(&format!("Simulated session {session_id}"));
    println!("{}", Table::new(rows));

    let decisions = controller.get_decision_log(session_id).await?;
    if !decisions.is_empty() {
        print_heading("Decisions");
        let rows: Vec<DecisionRow> = decisions.iter().map(DecisionRow::from).collect();
        println!("{}", Table::new(rows));
    }

    print_heading("Final Schedule");
    print_schedule(&controller.get_schedule(session_id).await?);
    let session = controller.get_session(session_id).await?;
    let events = controller.get_schedule_history(session_id).await?;
    println!(
        "\nSession ended {} with {} schedule changes",
        session.state,
        events.len()
    );
    Ok(())
}

pub async fn build_advisor(config: &CoachConfig) -> Result<Arc<dyn Advisor>> {
    if !config.ai.enabled {
        log::info!("Advisory coaching disabled, ambiguous states stay silent");
        return Ok(Arc::new(DisabledAdvisor));
    }

    let advisor = LlmAdvisor::from_config(&config.ai)?;
    if !advisor.is_reachable().await {
        log::warn!(
            "Advisory backend for {} is unreachable, ambiguous states stay silent",
            advisor.model_name()
        );
        return Ok(Arc::new(DisabledAdvisor));
    }
    Ok(Arc::new(advisor))
}

async fn play(
    controller: &SessionController,
    sensors: &ScriptedSensors,
    session_id: Uuid,
    ticks: Vec<ScenarioTick>,
) -> Result<Vec<TickRow>> {
    let mut rows = Vec::with_capacity(ticks.len());

    for (index, tick) in ticks.into_iter().enumerate() {
        if let Some(enabled) = tick.do_not_disturb {
            controller.set_do_not_disturb(session_id, enabled).await?;
        }

        // Sensors are only read while the session is Active
        let mut snapshot = None;
        if controller.get_session(session_id).await?.state == SessionState::Active {
            sensors.push(tick.focus, tick.fatigue).await;
            snapshot = controller.sample_tick(session_id).await?;
        }

        let decision = if tick.decide {
            controller.decide_tick(session_id).await?
        } else {
            None
        };

        if let Some(outcome) = tick.response {
            if let Err(e) = controller.record_user_response(session_id, outcome).await {
                log::warn!("Tick {index}: response {outcome} rejected: {e}");
            }
        }

        if tick.complete_active {
            let active = controller
                .get_schedule(session_id)
                .await?
                .into_iter()
                .find(|t| t.status == TaskStatus::Active);
            match active {
                Some(task) => {
                    controller.complete_task(session_id, task.id).await?;
                }
                None => log::warn!("Tick {index}: no active task to complete"),
            }
        }

        let session = controller.get_session(session_id).await?;
        let autonomy = controller.get_autonomy(session_id).await?;
        rows.push(TickRow {
            tick: index,
            focus: snapshot.as_ref().map_or_else(
                || "-".to_string(),
                |s| format!("{} ({})", s.focus_state, s.focus_source),
            ),
            fatigue: snapshot.as_ref().map_or_else(
                || "-".to_string(),
                |s| format!("{} ({})", s.fatigue_level, s.fatigue_source),
            ),
            decision: decision.map_or_else(
                || "-".to_string(),
                |d| truncate_str(&format!("{} [{}]", d.action.kind, d.rule), 32),
            ),
            ignore_count: autonomy.ignore_count,
            state: session.state.to_string(),
        });

        if session.state == SessionState::Completed {
            log::info!("Session completed after tick {index}");
            break;
        }
    }
    Ok(rows)
}
