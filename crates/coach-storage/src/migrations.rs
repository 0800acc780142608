use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if database table creation or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Sessions table - one row per study session, state owned by the controller
    conn.execute(
        "CREATE TABLE IF NOT EXISTS study_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            state TEXT NOT NULL,
            created_at TEXT NOT NULL,
            started_at TEXT,
            last_decision_at TEXT
        )",
        [],
    )?;

    // Signal snapshots - append-only, rowid preserves insertion order
    conn.execute(
        "CREATE TABLE IF NOT EXISTS signal_snapshots (
            session_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            focus_state TEXT NOT NULL,
            focus_score REAL NOT NULL,
            focus_source TEXT NOT NULL,
            fatigue_level TEXT NOT NULL,
            fatigue_score REAL NOT NULL,
            fatigue_source TEXT NOT NULL
        )",
        [],
    )?;

    // Autonomy state - one row per session
    conn.execute(
        "CREATE TABLE IF NOT EXISTS autonomy_states (
            session_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            ignore_count INTEGER NOT NULL DEFAULT 0,
            do_not_disturb INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Tasks - replaced as a whole after each schedule mutation
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            task_order INTEGER NOT NULL,
            title TEXT NOT NULL,
            start_offset_minutes INTEGER NOT NULL,
            duration_minutes INTEGER NOT NULL,
            status TEXT NOT NULL,
            kind TEXT NOT NULL
        )",
        [],
    )?;

    // Schedule history - write-once audit trail
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_history (
            session_id TEXT NOT NULL,
            sequence INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            event_kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            PRIMARY KEY (session_id, sequence)
        )",
        [],
    )?;

    // Decision log
    conn.execute(
        "CREATE TABLE IF NOT EXISTS decision_log (
            session_id TEXT NOT NULL,
            decided_at TEXT NOT NULL,
            rule TEXT NOT NULL,
            action_kind TEXT NOT NULL,
            reason TEXT NOT NULL,
            message TEXT,
            suggested_duration_minutes INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_session ON signal_snapshots(session_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tasks_session ON tasks(session_id, task_order)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_decisions_session ON decision_log(session_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 6);
    }
}
