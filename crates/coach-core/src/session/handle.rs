use coach_storage::models::{
    AutonomyState, CoachAction, ScheduleEvent, SessionState, SignalSnapshot, StudySession,
};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::aggregator::SignalHistory;
use crate::schedule::{Schedule, ScheduleHistory};

/// Session state guarded by the per-session writer lock
#[derive(Debug)]
pub(crate) struct SessionInner {
    pub(crate) session: StudySession,
    pub(crate) autonomy: AutonomyState,
    pub(crate) schedule: Schedule,
    /// Suggestion awaiting the learner's answer
    pub(crate) pending_suggestion: Option<CoachAction>,
    /// Suggestion already counted as ignored by expiry but still on screen;
    /// a late answer to it must not count again
    pub(crate) expired_suggestion: Option<CoachAction>,
}

impl SessionInner {
    pub(crate) fn new(
        session: StudySession,
        autonomy: AutonomyState,
        schedule: Schedule,
    ) -> Self {
        Self {
            session,
            autonomy,
            schedule,
            pending_suggestion: None,
            expired_suggestion: None,
        }
    }

    /// Drop any suggestion the learner could still answer
    pub(crate) fn clear_suggestions(&mut self) {
        self.pending_suggestion = None;
        self.expired_suggestion = None;
    }
}

/// Shared handle to one live session.
///
/// Every mutation goes through `inner`, which serializes writers. The two
/// append-only logs sit behind their own read-write locks so readers never
/// wait on a decision in flight; they only ever see a complete prefix.
#[derive(Debug)]
pub struct SessionHandle {
    session_id: Uuid,
    user_id: String,
    pub(crate) inner: Mutex<SessionInner>,
    pub(crate) signals: RwLock<SignalHistory>,
    pub(crate) history: RwLock<ScheduleHistory>,
    /// Keeps decision ticks for one session from overlapping
    pub(crate) decide_gate: Mutex<()>,
}

impl SessionHandle {
    pub(crate) fn new(
        inner: SessionInner,
        signals: SignalHistory,
        history: ScheduleHistory,
    ) -> Self {
        Self {
            session_id: inner.session.session_id,
            user_id: inner.session.user_id.clone(),
            inner: Mutex::new(inner),
            signals: RwLock::new(signals),
            history: RwLock::new(history),
            decide_gate: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.session.state
    }

    /// Copy of the signal history as of now
    pub async fn snapshots(&self) -> Vec<SignalSnapshot> {
        self.signals.read().await.snapshots().to_vec()
    }

    /// Copy of the schedule history as of now
    pub async fn schedule_events(&self) -> Vec<ScheduleEvent> {
        self.history.read().await.events().to_vec()
    }
}
