//! Read-only views of stored sessions, schedules and decisions

use anyhow::{Context, Result};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use uuid::Uuid;

use coach_storage::models::{DecisionRecord, ScheduleEvent, ScheduleEventPayload, StudySession, Task};
use coach_storage::Database;

use super::helpers::{open_database, print_heading, truncate_str};

#[derive(Tabled)]
pub struct TaskRow {
    #[tabled(rename = "#")]
    order: u32,
    #[tabled(rename = "Task")]
    title: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Start (min)")]
    start: u32,
    #[tabled(rename = "Duration (min)")]
    duration: u32,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            order: task.order,
            title: truncate_str(&task.title, 40),
            kind: task.kind.to_string(),
            start: task.start_offset_minutes,
            duration: task.duration_minutes,
            status: task.status.to_string(),
        }
    }
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Seq")]
    sequence: u64,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Event")]
    kind: String,
    #[tabled(rename = "Details")]
    details: String,
}

#[derive(Tabled)]
pub struct DecisionRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl From<&DecisionRecord> for DecisionRow {
    fn from(record: &DecisionRecord) -> Self {
        Self {
            time: record.decided_at.format("%H:%M:%S").to_string(),
            rule: record.rule.clone(),
            action: record.action.kind.to_string(),
            reason: truncate_str(&record.action.reason, 50),
        }
    }
}

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Session")]
    session_id: Uuid,
    #[tabled(rename = "User")]
    user_id: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl From<&StudySession> for SessionRow {
    fn from(session: &StudySession) -> Self {
        Self {
            session_id: session.session_id,
            user_id: session.user_id.clone(),
            state: session.state.to_string(),
            created: session.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

pub fn print_schedule(tasks: &[Task]) {
    let rows: Vec<TaskRow> = tasks.iter().map(TaskRow::from).collect();
    println!("{}", Table::new(rows));
}

pub fn handle_schedule_command(session_id: Uuid, db: Option<PathBuf>) -> Result<()> {
    let db = open_database(db)?;
    let session = require_session(&db, session_id)?;
    let tasks = db.get_tasks(session_id)?;

    print_heading(&format!("Schedule for {} ({})", session.user_id, session.state));
    print_schedule(&tasks);
    let total: u32 = tasks.iter().map(|t| t.duration_minutes).sum();
    println!("\nTotal planned time: {total} minutes");
    Ok(())
}

pub fn handle_history_command(session_id: Uuid, db: Option<PathBuf>) -> Result<()> {
    let db = open_database(db)?;
    require_session(&db, session_id)?;
    let events = db.get_schedule_events(session_id)?;

    print_heading("Schedule History");
    if events.is_empty() {
        println!("No schedule changes recorded.");
        return Ok(());
    }
    let rows: Vec<EventRow> = events.iter().map(event_row).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

pub fn handle_decisions_command(session_id: Uuid, db: Option<PathBuf>) -> Result<()> {
    let db = open_database(db)?;
    require_session(&db, session_id)?;
    let decisions = db.get_decisions(session_id)?;

    print_heading("Coaching Decisions");
    if decisions.is_empty() {
        println!("No decisions recorded.");
        return Ok(());
    }
    let rows: Vec<DecisionRow> = decisions.iter().map(DecisionRow::from).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

pub fn handle_sessions_command(db: Option<PathBuf>) -> Result<()> {
    let db = open_database(db)?;
    let sessions = db.list_sessions()?;

    print_heading("Study Sessions");
    if sessions.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }
    let rows: Vec<SessionRow> = sessions.iter().map(SessionRow::from).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn require_session(db: &Database, session_id: Uuid) -> Result<StudySession> {
    db.get_session(session_id)?
        .with_context(|| format!("Session {session_id} not found"))
}

fn event_row(event: &ScheduleEvent) -> EventRow {
    EventRow {
        sequence: event.sequence,
        time: event.timestamp.format("%H:%M:%S").to_string(),
        kind: event.kind().to_string(),
        details: describe_event(&event.payload),
    }
}

fn describe_event(payload: &ScheduleEventPayload) -> String {
    match payload {
        ScheduleEventPayload::BreakInserted {
            before_task_id,
            start_offset_minutes,
            duration_minutes,
            ..
        } => format!(
            "{duration_minutes} min break at +{start_offset_minutes} min before {}",
            short_id(*before_task_id)
        ),
        ScheduleEventPayload::TasksShifted { shifts } => match shifts.first() {
            Some(first) if shifts.iter().all(|s| s.delta_minutes == first.delta_minutes) => {
                format!("{} tasks moved by {} min", shifts.len(), first.delta_minutes)
            }
            _ => format!("{} tasks re-timed", shifts.len()),
        },
        ScheduleEventPayload::TaskCompleted { task_id, task_kind } => {
            format!("{task_kind} {}", short_id(*task_id))
        }
        ScheduleEventPayload::TaskExtended {
            task_id,
            added_minutes,
        } => format!("{} +{added_minutes} min", short_id(*task_id)),
        ScheduleEventPayload::TaskSkipped { task_id } => short_id(*task_id),
        ScheduleEventPayload::TaskMoved {
            task_id,
            from_position,
            to_position,
        } => format!("{} from #{from_position} to #{to_position}", short_id(*task_id)),
    }
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
