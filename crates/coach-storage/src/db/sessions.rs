use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::models::{AutonomyState, StudySession};

use super::helpers::{parse_datetime, parse_optional_datetime, parse_text, parse_uuid};
use super::Database;

impl Database {
    /// Insert or update a study session
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails
    pub fn save_session(&self, session: &StudySession) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO study_sessions (id, user_id, state, created_at, started_at, last_decision_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                started_at = excluded.started_at,
                last_decision_at = excluded.last_decision_at",
            params![
                session.session_id.to_string(),
                session.user_id,
                session.state.as_str(),
                session.created_at.to_rfc3339(),
                session.started_at.map(|t| t.to_rfc3339()),
                session.last_decision_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Get a study session by id
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_session(&self, session_id: Uuid) -> Result<Option<StudySession>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                "SELECT id, user_id, state, created_at, started_at, last_decision_at
                 FROM study_sessions WHERE id = ?1",
                [session_id.to_string()],
                Self::row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    /// List all study sessions, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn list_sessions(&self) -> Result<Vec<StudySession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, state, created_at, started_at, last_decision_at
             FROM study_sessions ORDER BY created_at DESC",
        )?;
        let sessions = stmt
            .query_map([], Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Insert or update the autonomy state of a session
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails
    pub fn save_autonomy(&self, state: &AutonomyState) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO autonomy_states (session_id, user_id, ignore_count, do_not_disturb)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                ignore_count = excluded.ignore_count,
                do_not_disturb = excluded.do_not_disturb",
            params![
                state.session_id.to_string(),
                state.user_id,
                state.ignore_count,
                state.do_not_disturb,
            ],
        )?;
        Ok(())
    }

    /// Get the autonomy state of a session
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_autonomy(&self, session_id: Uuid) -> Result<Option<AutonomyState>> {
        let conn = self.conn()?;
        let state = conn
            .query_row(
                "SELECT session_id, user_id, ignore_count, do_not_disturb
                 FROM autonomy_states WHERE session_id = ?1",
                [session_id.to_string()],
                |row| {
                    Ok(AutonomyState {
                        session_id: parse_uuid(&row.get::<_, String>(0)?)?,
                        user_id: row.get(1)?,
                        ignore_count: row.get(2)?,
                        do_not_disturb: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(state)
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<StudySession> {
        Ok(StudySession {
            session_id: parse_uuid(&row.get::<_, String>(0)?)?,
            user_id: row.get(1)?,
            state: parse_text(&row.get::<_, String>(2)?)?,
            created_at: parse_datetime(&row.get::<_, String>(3)?)?,
            started_at: parse_optional_datetime(row.get(4)?)?,
            last_decision_at: parse_optional_datetime(row.get(5)?)?,
        })
    }
}
