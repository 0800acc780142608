use anyhow::{Context, Result};
use rusqlite::params;
use uuid::Uuid;

use crate::models::{ScheduleEvent, ScheduleEventPayload, Task};

use super::helpers::{parse_datetime, parse_text, parse_uuid};
use super::Database;

impl Database {
    /// Replace a session's task list with the given ordered tasks
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails
    pub fn save_tasks(&self, session_id: Uuid, tasks: &[Task]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM tasks WHERE session_id = ?1",
            [session_id.to_string()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tasks (id, session_id, task_order, title, start_offset_minutes,
                    duration_minutes, status, kind)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for task in tasks {
                stmt.execute(params![
                    task.id.to_string(),
                    session_id.to_string(),
                    task.order,
                    task.title,
                    task.start_offset_minutes,
                    task.duration_minutes,
                    task.status.as_str(),
                    task.kind.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Get a session's tasks in timeline order
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_tasks(&self, session_id: Uuid) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, task_order, title, start_offset_minutes, duration_minutes,
                    status, kind
             FROM tasks
             WHERE session_id = ?1
             ORDER BY task_order ASC",
        )?;

        let tasks = stmt
            .query_map([session_id.to_string()], |row| {
                Ok(Task {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    session_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    order: row.get(2)?,
                    title: row.get(3)?,
                    start_offset_minutes: row.get(4)?,
                    duration_minutes: row.get(5)?,
                    status: parse_text(&row.get::<_, String>(6)?)?,
                    kind: parse_text(&row.get::<_, String>(7)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Append one event to a session's schedule history
    ///
    /// The (session, sequence) primary key rejects rewrites of an existing entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or the insert fails
    pub fn append_schedule_event(&self, event: &ScheduleEvent) -> Result<()> {
        let payload =
            serde_json::to_string(&event.payload).context("Failed to encode schedule event")?;
        let sequence = i64::try_from(event.sequence).context("Schedule sequence overflow")?;

        self.conn()?.execute(
            "INSERT INTO schedule_history (session_id, sequence, timestamp, event_kind, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.session_id.to_string(),
                sequence,
                event.timestamp.to_rfc3339(),
                event.kind().as_str(),
                payload,
            ],
        )?;
        Ok(())
    }

    /// Get a session's schedule history in sequence order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a payload cannot be decoded
    pub fn get_schedule_events(&self, session_id: Uuid) -> Result<Vec<ScheduleEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, sequence, timestamp, payload
             FROM schedule_history
             WHERE session_id = ?1
             ORDER BY sequence ASC",
        )?;

        let rows = stmt
            .query_map([session_id.to_string()], |row| {
                Ok((
                    parse_uuid(&row.get::<_, String>(0)?)?,
                    row.get::<_, i64>(1)?,
                    parse_datetime(&row.get::<_, String>(2)?)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(session_id, sequence, timestamp, payload)| {
                let payload: ScheduleEventPayload = serde_json::from_str(&payload)
                    .context("Failed to decode schedule event payload")?;
                Ok(ScheduleEvent {
                    session_id,
                    sequence: u64::try_from(sequence).context("Negative schedule sequence")?,
                    timestamp,
                    payload,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScheduleEventKind, TaskKind, TaskShift, TaskStatus};
    use chrono::Utc;

    fn task(session_id: Uuid, order: u32, start: u32, duration: u32) -> Task {
        Task {
            id: Uuid::new_v4(),
            session_id,
            order,
            title: format!("Task {order}"),
            start_offset_minutes: start,
            duration_minutes: duration,
            status: TaskStatus::Pending,
            kind: TaskKind::Study,
        }
    }

    #[test]
    fn test_save_tasks_replaces_previous_list() {
        let db = Database::open_in_memory().unwrap();
        let session_id = Uuid::new_v4();
        db.save_tasks(session_id, &[task(session_id, 0, 0, 25)]).unwrap();

        let replacement = vec![task(session_id, 0, 0, 10), task(session_id, 1, 10, 20)];
        db.save_tasks(session_id, &replacement).unwrap();

        assert_eq!(db.get_tasks(session_id).unwrap(), replacement);
    }

    #[test]
    fn test_schedule_events_roundtrip_in_order() {
        let db = Database::open_in_memory().unwrap();
        let session_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();

        let events = vec![
            ScheduleEvent {
                session_id,
                sequence: 0,
                timestamp: Utc::now(),
                payload: ScheduleEventPayload::TasksShifted {
                    shifts: vec![TaskShift {
                        task_id,
                        from_offset_minutes: 30,
                        to_offset_minutes: 10,
                        delta_minutes: -20,
                    }],
                },
            },
            ScheduleEvent {
                session_id,
                sequence: 1,
                timestamp: Utc::now(),
                payload: ScheduleEventPayload::TaskCompleted {
                    task_id,
                    task_kind: TaskKind::Study,
                },
            },
            ScheduleEvent {
                session_id,
                sequence: 2,
                timestamp: Utc::now(),
                payload: ScheduleEventPayload::TaskMoved {
                    task_id,
                    from_position: 3,
                    to_position: 1,
                },
            },
        ];
        for event in &events {
            db.append_schedule_event(event).unwrap();
        }

        let loaded = db.get_schedule_events(session_id).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].payload, events[0].payload);
        assert_eq!(loaded[1].sequence, 1);
        assert_eq!(loaded[2].kind(), ScheduleEventKind::TaskMoved);
    }

    #[test]
    fn test_schedule_event_cannot_be_rewritten() {
        let db = Database::open_in_memory().unwrap();
        let event = ScheduleEvent {
            session_id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            payload: ScheduleEventPayload::TaskSkipped {
                task_id: Uuid::new_v4(),
            },
        };
        db.append_schedule_event(&event).unwrap();
        assert!(db.append_schedule_event(&event).is_err());
    }
}
