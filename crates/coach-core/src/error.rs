use coach_storage::models::SessionState;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced to callers of the session controller.
///
/// Sensor and advisory failures never appear here; they degrade to safe
/// defaults inside the aggregator and the decision engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A schedule mutation was rejected; the schedule is unchanged
    #[error("session {session_id}: schedule invariant violated: {reason}")]
    InvariantViolation { session_id: Uuid, reason: String },

    #[error("session {session_id}: cannot {action} while {from}")]
    InvalidTransition {
        session_id: Uuid,
        from: SessionState,
        action: &'static str,
    },

    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("session {session_id}: task {task_id} not found")]
    TaskNotFound { session_id: Uuid, task_id: Uuid },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub(crate) fn invariant(session_id: Uuid, reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            session_id,
            reason: reason.into(),
        }
    }

    pub(crate) const fn transition(
        session_id: Uuid,
        from: SessionState,
        action: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            session_id,
            from,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_session() {
        let id = Uuid::new_v4();
        let err = CoreError::transition(id, SessionState::Idle, "complete a task");
        assert_eq!(
            err.to_string(),
            format!("session {id}: cannot complete a task while Idle")
        );

        let err = CoreError::invariant(id, "unknown task");
        assert!(err.to_string().contains("unknown task"));
    }

    #[test]
    fn test_storage_errors_keep_context() {
        let err: CoreError = anyhow::anyhow!("disk full").context("Failed to save tasks").into();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(err.to_string(), "Failed to save tasks");
    }
}
