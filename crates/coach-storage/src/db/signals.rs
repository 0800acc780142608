use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

use crate::models::SignalSnapshot;

use super::helpers::{parse_datetime, parse_text, parse_uuid};
use super::Database;

impl Database {
    /// Append a signal snapshot to a session's history
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails
    pub fn append_snapshot(&self, snapshot: &SignalSnapshot) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO signal_snapshots (session_id, user_id, timestamp, focus_state, focus_score,
                focus_source, fatigue_level, fatigue_score, fatigue_source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                snapshot.session_id.to_string(),
                snapshot.user_id,
                snapshot.timestamp.to_rfc3339(),
                snapshot.focus_state.as_str(),
                f64::from(snapshot.focus_score),
                snapshot.focus_source.as_str(),
                snapshot.fatigue_level.as_str(),
                f64::from(snapshot.fatigue_score),
                snapshot.fatigue_source.as_str(),
            ],
        )?;
        log::debug!(
            "Stored snapshot for session {}: {} / {}",
            snapshot.session_id,
            snapshot.focus_state,
            snapshot.fatigue_level
        );
        Ok(())
    }

    /// Get a session's snapshots in insertion order
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_snapshots(&self, session_id: Uuid) -> Result<Vec<SignalSnapshot>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, user_id, timestamp, focus_state, focus_score, focus_source,
                    fatigue_level, fatigue_score, fatigue_source
             FROM signal_snapshots
             WHERE session_id = ?1
             ORDER BY rowid ASC",
        )?;

        let snapshots = stmt
            .query_map([session_id.to_string()], Self::row_to_snapshot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<SignalSnapshot> {
        Ok(SignalSnapshot {
            session_id: parse_uuid(&row.get::<_, String>(0)?)?,
            user_id: row.get(1)?,
            timestamp: parse_datetime(&row.get::<_, String>(2)?)?,
            focus_state: parse_text(&row.get::<_, String>(3)?)?,
            focus_score: row.get::<_, f64>(4)? as f32,
            focus_source: parse_text(&row.get::<_, String>(5)?)?,
            fatigue_level: parse_text(&row.get::<_, String>(6)?)?,
            fatigue_score: row.get::<_, f64>(7)? as f32,
            fatigue_source: parse_text(&row.get::<_, String>(8)?)?,
        })
    }
}
