use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

use crate::models::{CoachAction, DecisionRecord};

use super::helpers::{parse_datetime, parse_text, parse_uuid};
use super::Database;

impl Database {
    /// Record a coaching decision
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails
    pub fn append_decision(&self, record: &DecisionRecord) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO decision_log (session_id, decided_at, rule, action_kind, reason, message,
                suggested_duration_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.session_id.to_string(),
                record.decided_at.to_rfc3339(),
                record.rule,
                record.action.kind.as_str(),
                record.action.reason,
                record.action.message,
                record.action.suggested_duration_minutes,
            ],
        )?;
        Ok(())
    }

    /// Get a session's decisions in the order they were made
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_decisions(&self, session_id: Uuid) -> Result<Vec<DecisionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, decided_at, rule, action_kind, reason, message,
                    suggested_duration_minutes
             FROM decision_log
             WHERE session_id = ?1
             ORDER BY rowid ASC",
        )?;

        let records = stmt
            .query_map([session_id.to_string()], |row| {
                Ok(DecisionRecord {
                    session_id: parse_uuid(&row.get::<_, String>(0)?)?,
                    decided_at: parse_datetime(&row.get::<_, String>(1)?)?,
                    rule: row.get(2)?,
                    action: CoachAction {
                        kind: parse_text(&row.get::<_, String>(3)?)?,
                        reason: row.get(4)?,
                        message: row.get(5)?,
                        suggested_duration_minutes: row.get(6)?,
                    },
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_decision_log_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let session_id = Uuid::new_v4();
        let record = DecisionRecord {
            session_id,
            decided_at: Utc::now(),
            rule: "critical_fatigue".to_string(),
            action: CoachAction::force_break("Critical fatigue", "Stop now".to_string(), 10),
        };
        db.append_decision(&record).unwrap();
        db.append_decision(&DecisionRecord {
            rule: "do_not_disturb".to_string(),
            action: CoachAction::silence("Do not disturb is enabled"),
            ..record.clone()
        })
        .unwrap();

        let loaded = db.get_decisions(session_id).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].action, record.action);
        assert_eq!(loaded[1].rule, "do_not_disturb");
        assert!(loaded[1].action.message.is_none());
    }
}
