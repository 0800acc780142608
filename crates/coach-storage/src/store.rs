//! Persistence seam used by the coaching core.
//!
//! The core only needs get/append/update by session id; `Database` is the
//! SQLite-backed implementation.

use anyhow::Result;
use uuid::Uuid;

use crate::db::Database;
use crate::models::{
    AutonomyState, DecisionRecord, ScheduleEvent, SignalSnapshot, StudySession, Task,
};

/// Durable storage for every session-scoped entity
pub trait SessionStore: Send + Sync {
    /// Insert or update a session row
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails
    fn save_session(&self, session: &StudySession) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the read fails
    fn get_session(&self, session_id: Uuid) -> Result<Option<StudySession>>;

    /// # Errors
    ///
    /// Returns an error if the read fails
    fn list_sessions(&self) -> Result<Vec<StudySession>>;

    /// # Errors
    ///
    /// Returns an error if the write fails
    fn append_snapshot(&self, snapshot: &SignalSnapshot) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the read fails
    fn get_snapshots(&self, session_id: Uuid) -> Result<Vec<SignalSnapshot>>;

    /// # Errors
    ///
    /// Returns an error if the write fails
    fn save_autonomy(&self, state: &AutonomyState) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the read fails
    fn get_autonomy(&self, session_id: Uuid) -> Result<Option<AutonomyState>>;

    /// Replace the whole ordered task list of a session
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails
    fn save_tasks(&self, session_id: Uuid, tasks: &[Task]) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the read fails
    fn get_tasks(&self, session_id: Uuid) -> Result<Vec<Task>>;

    /// # Errors
    ///
    /// Returns an error if the write fails or the sequence number already exists
    fn append_schedule_event(&self, event: &ScheduleEvent) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the read fails
    fn get_schedule_events(&self, session_id: Uuid) -> Result<Vec<ScheduleEvent>>;

    /// # Errors
    ///
    /// Returns an error if the write fails
    fn append_decision(&self, record: &DecisionRecord) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the read fails
    fn get_decisions(&self, session_id: Uuid) -> Result<Vec<DecisionRecord>>;
}

impl SessionStore for Database {
    fn save_session(&self, session: &StudySession) -> Result<()> {
        Database::save_session(self, session)
    }

    fn get_session(&self, session_id: Uuid) -> Result<Option<StudySession>> {
        Database::get_session(self, session_id)
    }

    fn list_sessions(&self) -> Result<Vec<StudySession>> {
        Database::list_sessions(self)
    }

    fn append_snapshot(&self, snapshot: &SignalSnapshot) -> Result<()> {
        Database::append_snapshot(self, snapshot)
    }

    fn get_snapshots(&self, session_id: Uuid) -> Result<Vec<SignalSnapshot>> {
        Database::get_snapshots(self, session_id)
    }

    fn save_autonomy(&self, state: &AutonomyState) -> Result<()> {
        Database::save_autonomy(self, state)
    }

    fn get_autonomy(&self, session_id: Uuid) -> Result<Option<AutonomyState>> {
        Database::get_autonomy(self, session_id)
    }

    fn save_tasks(&self, session_id: Uuid, tasks: &[Task]) -> Result<()> {
        Database::save_tasks(self, session_id, tasks)
    }

    fn get_tasks(&self, session_id: Uuid) -> Result<Vec<Task>> {
        Database::get_tasks(self, session_id)
    }

    fn append_schedule_event(&self, event: &ScheduleEvent) -> Result<()> {
        Database::append_schedule_event(self, event)
    }

    fn get_schedule_events(&self, session_id: Uuid) -> Result<Vec<ScheduleEvent>> {
        Database::get_schedule_events(self, session_id)
    }

    fn append_decision(&self, record: &DecisionRecord) -> Result<()> {
        Database::append_decision(self, record)
    }

    fn get_decisions(&self, session_id: Uuid) -> Result<Vec<DecisionRecord>> {
        Database::get_decisions(self, session_id)
    }
}
