//! Session controller: the per-session state machine and sole writer of
//! session state.
//!
//! ```text
//! Idle -(start)-> Active -(ForceBreak | accepted Suggest)-> Paused
//!   Paused -(break completed)-> Active -(all tasks finished)-> Completed
//! ```
//!
//! Sampling and decision ticks on a session that is not Active are no-ops.

mod handle;

pub use handle::SessionHandle;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use coach_ai::{Advisor, TaskContext};
use coach_storage::models::{
    AutonomyState, CoachAction, CoachActionKind, DecisionRecord, ResponseOutcome, ScheduleEvent,
    SessionState, SignalSnapshot, StudySession, Task, TaskKind,
};
use coach_storage::SessionStore;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::aggregator::{Aggregator, SignalHistory};
use crate::autonomy;
use crate::config::CoachConfig;
use crate::decision::{Decision, DecisionContext, DecisionEngine};
use crate::error::{CoreError, Result};
use crate::schedule::{PlannedTask, Schedule, ScheduleHistory};
use crate::sensors::{FatigueProvider, FocusProvider, RawReadings};
use handle::SessionInner;

/// Upcoming tasks shown to the advisory source
const UPCOMING_CONTEXT: usize = 3;

pub struct SessionController {
    config: CoachConfig,
    store: Arc<dyn SessionStore>,
    focus: Arc<dyn FocusProvider>,
    fatigue: Arc<dyn FatigueProvider>,
    aggregator: Aggregator,
    engine: DecisionEngine,
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
}

impl SessionController {
    #[must_use]
    pub fn new(
        config: CoachConfig,
        store: Arc<dyn SessionStore>,
        focus: Arc<dyn FocusProvider>,
        fatigue: Arc<dyn FatigueProvider>,
        advisor: Arc<dyn Advisor>,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(&config),
            engine: DecisionEngine::new(&config, advisor),
            config,
            store,
            focus,
            fatigue,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the decision engine (e.g. one with a shorter advisory timeout)
    #[must_use]
    pub fn with_engine(mut self, engine: DecisionEngine) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &CoachConfig {
        &self.config
    }

    // ==================== Lifecycle ====================

    /// Create an Idle session with its plan laid out from offset 0
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` for an invalid plan, or a storage error
    pub async fn open_session(&self, user_id: &str, plan: &[PlannedTask]) -> Result<Uuid> {
        let session = StudySession::new(user_id);
        let session_id = session.session_id;
        let schedule = Schedule::from_plan(session_id, plan)?;
        let autonomy = AutonomyState::new(user_id, session_id);

        self.store.save_session(&session)?;
        self.store.save_autonomy(&autonomy)?;
        self.store.save_tasks(session_id, schedule.tasks())?;

        let handle = SessionHandle::new(
            SessionInner::new(session, autonomy, schedule),
            SignalHistory::new(),
            ScheduleHistory::new(session_id),
        );
        self.sessions
            .write()
            .await
            .insert(session_id, Arc::new(handle));

        log::info!(
            "Opened session {session_id} for {user_id} with {} tasks",
            plan.len()
        );
        Ok(session_id)
    }

    /// Idle to Active; the first task becomes active
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the session is Idle
    pub async fn start(&self, session_id: Uuid) -> Result<()> {
        let handle = self.handle(session_id).await?;
        let mut inner = handle.inner.lock().await;
        let state = inner.session.state;
        if state != SessionState::Idle {
            return Err(CoreError::transition(session_id, state, "start"));
        }

        inner.session.started_at = Some(Utc::now());
        inner.schedule.activate_next();
        Self::transition(&mut inner, SessionState::Active);
        self.store.save_tasks(session_id, inner.schedule.tasks())?;
        self.store.save_session(&inner.session)?;
        Ok(())
    }

    /// Open and immediately start a session
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` for an invalid plan, or a storage error
    pub async fn start_session(&self, user_id: &str, plan: &[PlannedTask]) -> Result<Uuid> {
        let session_id = self.open_session(user_id, plan).await?;
        self.start(session_id).await?;
        Ok(session_id)
    }

    /// End a session early; both timers ignore it from then on
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the session is already Completed
    pub async fn stop_session(&self, session_id: Uuid) -> Result<()> {
        let handle = self.handle(session_id).await?;
        let mut inner = handle.inner.lock().await;
        let state = inner.session.state;
        if state == SessionState::Completed {
            return Err(CoreError::transition(session_id, state, "stop"));
        }

        Self::transition(&mut inner, SessionState::Completed);
        self.store.save_session(&inner.session)?;
        Ok(())
    }

    /// Reload every unfinished session from the store into the registry
    ///
    /// Sessions already live are left alone. Returns how many were loaded.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any read fails
    pub async fn resume_sessions(&self) -> Result<usize> {
        let mut loaded = 0;
        for session in self.store.list_sessions()? {
            if session.state == SessionState::Completed
                || self.sessions.read().await.contains_key(&session.session_id)
            {
                continue;
            }
            let session_id = session.session_id;
            let autonomy = self
                .store
                .get_autonomy(session_id)?
                .unwrap_or_else(|| AutonomyState::new(&session.user_id, session_id));
            let schedule = Schedule::from_tasks(session_id, self.store.get_tasks(session_id)?);
            let signals = SignalHistory::from_snapshots(self.store.get_snapshots(session_id)?);
            let history = ScheduleHistory::from_events(
                session_id,
                self.store.get_schedule_events(session_id)?,
            );

            let handle = SessionHandle::new(
                SessionInner::new(session, autonomy, schedule),
                signals,
                history,
            );
            self.sessions
                .write()
                .await
                .insert(session_id, Arc::new(handle));
            loaded += 1;
        }
        if loaded > 0 {
            log::info!("Resumed {loaded} unfinished sessions");
        }
        Ok(loaded)
    }

    // ==================== Learner input ====================

    /// Apply the learner's answer to coaching.
    ///
    /// `Accepted` turns the suggestion on screen into a break and pauses the
    /// session, even one that already expired. `Ignored` counts once per
    /// suggestion, so dismissing an expired one adds nothing.
    /// `BreakCompleted` finishes the running break and resumes it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` on a Completed session, or for
    /// `BreakCompleted` outside Paused
    pub async fn record_user_response(
        &self,
        session_id: Uuid,
        outcome: ResponseOutcome,
    ) -> Result<AutonomyState> {
        let handle = self.handle(session_id).await?;
        let mut inner = handle.inner.lock().await;
        let state = inner.session.state;
        if state == SessionState::Completed {
            return Err(CoreError::transition(session_id, state, "record a response"));
        }

        match outcome {
            ResponseOutcome::Accepted => {
                let shown = match inner.pending_suggestion.take() {
                    Some(pending) => Some(pending),
                    None => inner.expired_suggestion.take(),
                };
                autonomy::record_response(&mut inner.autonomy, outcome);
                self.store.save_autonomy(&inner.autonomy)?;
                if let Some(suggestion) = shown {
                    if state == SessionState::Active {
                        let minutes = suggestion
                            .suggested_duration_minutes
                            .unwrap_or(self.config.suggested_break_minutes);
                        self.pause_for_break(&handle, &mut inner, minutes, Utc::now())
                            .await?;
                    }
                }
            }
            ResponseOutcome::Ignored => {
                let already_counted =
                    inner.pending_suggestion.is_none() && inner.expired_suggestion.take().is_some();
                if already_counted {
                    log::debug!(
                        "Session {session_id}: expired suggestion dismissed, already counted"
                    );
                } else {
                    inner.pending_suggestion = None;
                    autonomy::record_response(&mut inner.autonomy, outcome);
                    self.store.save_autonomy(&inner.autonomy)?;
                }
            }
            ResponseOutcome::BreakCompleted => {
                if state != SessionState::Paused {
                    return Err(CoreError::transition(session_id, state, "complete a break"));
                }
                let break_id = inner
                    .schedule
                    .active_task()
                    .filter(|t| t.kind == TaskKind::Break)
                    .map(|t| t.id)
                    .ok_or_else(|| CoreError::invariant(session_id, "no running break"))?;
                self.finish_task(&handle, &mut inner, break_id).await?;
            }
        }
        Ok(inner.autonomy.clone())
    }

    /// # Errors
    ///
    /// Returns a storage error if the autonomy state cannot be saved
    pub async fn set_do_not_disturb(
        &self,
        session_id: Uuid,
        enabled: bool,
    ) -> Result<AutonomyState> {
        let handle = self.handle(session_id).await?;
        let mut inner = handle.inner.lock().await;
        autonomy::set_do_not_disturb(&mut inner.autonomy, enabled);
        self.store.save_autonomy(&inner.autonomy)?;
        Ok(inner.autonomy.clone())
    }

    // ==================== Schedule operations ====================

    /// Mark a task Completed and advance the session.
    ///
    /// Completing the running break resumes a Paused session; finishing the
    /// last task completes it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` outside Active/Paused or for a study task
    /// while Paused, and schedule errors for unknown or finished tasks
    pub async fn complete_task(&self, session_id: Uuid, task_id: Uuid) -> Result<Vec<Task>> {
        let handle = self.handle(session_id).await?;
        let mut inner = handle.inner.lock().await;
        let state = Self::require_running(&inner, "complete a task")?;
        let kind = inner
            .schedule
            .task(task_id)
            .map(|t| t.kind)
            .ok_or(CoreError::TaskNotFound {
                session_id,
                task_id,
            })?;
        if state == SessionState::Paused && kind != TaskKind::Break {
            return Err(CoreError::transition(
                session_id,
                state,
                "complete a study task",
            ));
        }

        self.finish_task(&handle, &mut inner, task_id).await?;
        Ok(inner.schedule.tasks().to_vec())
    }

    /// Lengthen a task and shift everything after it
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` outside Active/Paused and schedule errors
    /// for unknown or finished tasks
    pub async fn extend_task(
        &self,
        session_id: Uuid,
        task_id: Uuid,
        minutes: u32,
    ) -> Result<Vec<Task>> {
        let handle = self.handle(session_id).await?;
        let mut inner = handle.inner.lock().await;
        Self::require_running(&inner, "extend a task")?;

        {
            let mut history = handle.history.write().await;
            inner
                .schedule
                .extend_task(&mut history, task_id, minutes, Utc::now())?;
        }
        self.persist_schedule(&handle, &inner).await?;
        Ok(inner.schedule.tasks().to_vec())
    }

    /// Skip a study task; skipping the active one moves on to the next
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` outside Active/Paused or for a break, and
    /// schedule errors for unknown or finished tasks
    pub async fn skip_task(&self, session_id: Uuid, task_id: Uuid) -> Result<Vec<Task>> {
        let handle = self.handle(session_id).await?;
        let mut inner = handle.inner.lock().await;
        let state = Self::require_running(&inner, "skip a task")?;
        if inner.schedule.task(task_id).map(|t| t.kind) == Some(TaskKind::Break) {
            return Err(CoreError::transition(session_id, state, "skip a break"));
        }

        {
            let mut history = handle.history.write().await;
            inner
                .schedule
                .skip_task(&mut history, task_id, Utc::now())?;
        }
        if state == SessionState::Active {
            inner.schedule.activate_next();
        }
        Self::complete_if_finished(&mut inner);
        self.persist_schedule(&handle, &inner).await?;
        self.store.save_session(&inner.session)?;
        Ok(inner.schedule.tasks().to_vec())
    }

    /// Reorder a pending task; tasks it passes are re-timed
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` outside Active/Paused and schedule errors
    /// for unknown tasks, bad positions or started work in the way
    pub async fn move_task(
        &self,
        session_id: Uuid,
        task_id: Uuid,
        to_position: u32,
    ) -> Result<Vec<Task>> {
        let handle = self.handle(session_id).await?;
        let mut inner = handle.inner.lock().await;
        Self::require_running(&inner, "move a task")?;

        {
            let mut history = handle.history.write().await;
            inner
                .schedule
                .move_task(&mut history, task_id, to_position, Utc::now())?;
        }
        self.persist_schedule(&handle, &inner).await?;
        Ok(inner.schedule.tasks().to_vec())
    }

    // ==================== Ticks ====================

    /// Take one signal sample for an Active session
    ///
    /// Returns `None` when the session is not Active.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` or a storage error
    pub async fn sample_tick(&self, session_id: Uuid) -> Result<Option<SignalSnapshot>> {
        let handle = self.handle(session_id).await?;
        if handle.state().await != SessionState::Active {
            return Ok(None);
        }

        let raw = RawReadings::collect(
            self.focus.as_ref(),
            self.fatigue.as_ref(),
            handle.user_id(),
            session_id,
        )
        .await;

        let inner = handle.inner.lock().await;
        if inner.session.state != SessionState::Active {
            return Ok(None);
        }
        let snapshot = {
            let mut signals = handle.signals.write().await;
            self.aggregator.observe(
                &mut signals,
                handle.user_id(),
                session_id,
                raw,
                Utc::now(),
            )
        };
        self.store.append_snapshot(&snapshot)?;
        drop(inner);
        Ok(Some(snapshot))
    }

    /// Make one coaching decision for an Active session and apply it.
    ///
    /// The writer lock is released while the decision is evaluated, so a slow
    /// advisory call never blocks learner input. Returns `None` when the
    /// session is not Active, has no snapshot yet, or left Active meanwhile.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound`, a storage error, or a schedule error from
    /// inserting a forced break
    pub async fn decide_tick(&self, session_id: Uuid) -> Result<Option<Decision>> {
        let handle = self.handle(session_id).await?;
        let _gate = handle.decide_gate.lock().await;

        let Some(ctx) = self.prepare_decision(&handle).await? else {
            return Ok(None);
        };
        let decision = self.engine.decide(&ctx).await;

        let mut inner = handle.inner.lock().await;
        if inner.session.state != SessionState::Active {
            log::info!(
                "Session {session_id} left Active during decision, dropping {}",
                decision.action.kind
            );
            return Ok(None);
        }
        let decision = if inner.autonomy == ctx.autonomy {
            decision
        } else {
            let current = DecisionContext {
                autonomy: inner.autonomy.clone(),
                ..ctx
            };
            self.engine.recheck(&current, decision)
        };

        let now = Utc::now();
        inner.session.last_decision_at = Some(now);
        self.store.append_decision(&DecisionRecord {
            session_id,
            decided_at: now,
            rule: decision.rule.to_string(),
            action: decision.action.clone(),
        })?;

        match decision.action.kind {
            CoachActionKind::Silence => {}
            CoachActionKind::Suggest => {
                inner.expired_suggestion = None;
                inner.pending_suggestion = Some(decision.action.clone());
            }
            CoachActionKind::ForceBreak => {
                inner.clear_suggestions();
                let minutes = decision
                    .action
                    .suggested_duration_minutes
                    .unwrap_or(self.config.force_break_minutes);
                self.pause_for_break(&handle, &mut inner, minutes, now)
                    .await?;
            }
        }
        self.store.save_session(&inner.session)?;
        Ok(Some(decision))
    }

    /// Sample every live session concurrently; returns snapshots taken
    pub async fn sample_all(self: &Arc<Self>) -> usize {
        self.tick_all("Sampling", |controller, id| async move {
            controller.sample_tick(id).await
        })
        .await
    }

    /// Decide for every live session concurrently; returns decisions made
    pub async fn decide_all(self: &Arc<Self>) -> usize {
        self.tick_all("Decision", |controller, id| async move {
            controller.decide_tick(id).await
        })
        .await
    }

    // ==================== Queries ====================

    /// Latest fully appended snapshot
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown session
    pub async fn get_current_signals(&self, session_id: Uuid) -> Result<Option<SignalSnapshot>> {
        let handle = self.handle(session_id).await?;
        let signals = handle.signals.read().await;
        Ok(signals.latest().cloned())
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown session
    pub async fn get_signal_history(&self, session_id: Uuid) -> Result<Vec<SignalSnapshot>> {
        Ok(self.handle(session_id).await?.snapshots().await)
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown session
    pub async fn get_schedule(&self, session_id: Uuid) -> Result<Vec<Task>> {
        let handle = self.handle(session_id).await?;
        let inner = handle.inner.lock().await;
        Ok(inner.schedule.tasks().to_vec())
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown session
    pub async fn get_schedule_history(&self, session_id: Uuid) -> Result<Vec<ScheduleEvent>> {
        Ok(self.handle(session_id).await?.schedule_events().await)
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown session
    pub async fn get_session(&self, session_id: Uuid) -> Result<StudySession> {
        let handle = self.handle(session_id).await?;
        let inner = handle.inner.lock().await;
        Ok(inner.session.clone())
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown session
    pub async fn get_autonomy(&self, session_id: Uuid) -> Result<AutonomyState> {
        let handle = self.handle(session_id).await?;
        let inner = handle.inner.lock().await;
        Ok(inner.autonomy.clone())
    }

    /// Suggestion still waiting for the learner's answer
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown session
    pub async fn get_pending_suggestion(&self, session_id: Uuid) -> Result<Option<CoachAction>> {
        let handle = self.handle(session_id).await?;
        let inner = handle.inner.lock().await;
        Ok(inner.pending_suggestion.clone())
    }

    /// Persisted decisions in the order they were made
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown session or a storage error
    pub async fn get_decision_log(&self, session_id: Uuid) -> Result<Vec<DecisionRecord>> {
        self.handle(session_id).await?;
        Ok(self.store.get_decisions(session_id)?)
    }

    pub async fn list_sessions(&self) -> Vec<StudySession> {
        let handles: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut sessions = Vec::with_capacity(handles.len());
        for handle in handles {
            sessions.push(handle.inner.lock().await.session.clone());
        }
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    // ==================== Internals ====================

    async fn handle(&self, session_id: Uuid) -> Result<Arc<SessionHandle>> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(CoreError::SessionNotFound(session_id))
    }

    fn require_running(inner: &SessionInner, action: &'static str) -> Result<SessionState> {
        let state = inner.session.state;
        match state {
            SessionState::Active | SessionState::Paused => Ok(state),
            SessionState::Idle | SessionState::Completed => Err(CoreError::transition(
                inner.session.session_id,
                state,
                action,
            )),
        }
    }

    /// Every transition retires whatever suggestion was on screen
    fn transition(inner: &mut SessionInner, to: SessionState) {
        let from = inner.session.state;
        inner.session.state = to;
        inner.clear_suggestions();
        log::info!(
            "Session {}: {from} -> {to}",
            inner.session.session_id
        );
    }

    fn complete_if_finished(inner: &mut SessionInner) {
        if inner.session.state != SessionState::Completed && inner.schedule.all_finished() {
            Self::transition(inner, SessionState::Completed);
        }
    }

    /// Snapshot the state a decision is made from, under the writer lock
    async fn prepare_decision(&self, handle: &SessionHandle) -> Result<Option<DecisionContext>> {
        let mut inner = handle.inner.lock().await;
        if inner.session.state != SessionState::Active {
            return Ok(None);
        }

        if self.config.expire_unanswered_suggestions {
            if let Some(unanswered) = inner.pending_suggestion.take() {
                log::info!(
                    "Session {}: unanswered suggestion counted as ignored",
                    handle.session_id()
                );
                autonomy::record_response(&mut inner.autonomy, ResponseOutcome::Ignored);
                self.store.save_autonomy(&inner.autonomy)?;
                inner.expired_suggestion = Some(unanswered);
            }
        }

        let signals = handle.signals.read().await;
        let Some(snapshot) = signals.latest().cloned() else {
            log::debug!(
                "Session {}: no snapshot yet, skipping decision",
                handle.session_id()
            );
            return Ok(None);
        };

        Ok(Some(DecisionContext {
            focus_streak: signals.focused_streak(),
            fatigue_trend: signals.fatigue_trend(self.config.trend_window),
            minutes_into_session: minutes_since(inner.session.started_at, snapshot.timestamp),
            autonomy: inner.autonomy.clone(),
            current_task: inner.schedule.current_task().map(task_context),
            upcoming_tasks: inner
                .schedule
                .upcoming(UPCOMING_CONTEXT)
                .into_iter()
                .map(task_context)
                .collect(),
            snapshot,
        }))
    }

    /// Active to Paused: insert a break in front of the current task and start it
    async fn pause_for_break(
        &self,
        handle: &SessionHandle,
        inner: &mut SessionInner,
        minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        let session_id = handle.session_id();
        let reference = inner
            .schedule
            .current_task()
            .map(|t| t.id)
            .ok_or_else(|| CoreError::invariant(session_id, "no task left to break before"))?;

        let break_id = {
            let mut history = handle.history.write().await;
            inner
                .schedule
                .insert_break(&mut history, reference, minutes, now)?
        };
        inner.schedule.activate(break_id)?;
        Self::transition(inner, SessionState::Paused);
        self.persist_schedule(handle, inner).await?;
        self.store.save_session(&inner.session)?;
        Ok(break_id)
    }

    /// Complete a task and advance: a finished break resumes the session,
    /// the last finished task completes it
    async fn finish_task(
        &self,
        handle: &SessionHandle,
        inner: &mut SessionInner,
        task_id: Uuid,
    ) -> Result<()> {
        let kind = {
            let mut history = handle.history.write().await;
            inner
                .schedule
                .complete_task(&mut history, task_id, Utc::now())?
        };

        if kind == TaskKind::Break {
            autonomy::record_response(&mut inner.autonomy, ResponseOutcome::BreakCompleted);
            self.store.save_autonomy(&inner.autonomy)?;
            if inner.session.state == SessionState::Paused {
                Self::transition(inner, SessionState::Active);
            }
        }
        if inner.session.state == SessionState::Active {
            inner.schedule.activate_next();
        }
        Self::complete_if_finished(inner);

        self.persist_schedule(handle, inner).await?;
        self.store.save_session(&inner.session)?;
        Ok(())
    }

    /// Write the task list and every history event the store has not seen.
    ///
    /// Events are marked one at a time, so after a failed write the next
    /// mutation picks up from the first event that did not make it.
    async fn persist_schedule(&self, handle: &SessionHandle, inner: &SessionInner) -> Result<()> {
        self.store
            .save_tasks(inner.session.session_id, inner.schedule.tasks())?;
        let mut history = handle.history.write().await;
        while let Some(event) = history.unpersisted().first().cloned() {
            self.store.append_schedule_event(&event)?;
            history.mark_persisted();
        }
        Ok(())
    }

    async fn tick_all<T, F, Fut>(self: &Arc<Self>, label: &'static str, tick: F) -> usize
    where
        F: Fn(Arc<Self>, Uuid) -> Fut,
        Fut: Future<Output = Result<Option<T>>> + Send + 'static,
        T: Send + 'static,
    {
        let ids: Vec<Uuid> = self.sessions.read().await.keys().copied().collect();
        let mut tasks = JoinSet::new();
        for id in ids {
            let fut = tick(Arc::clone(self), id);
            tasks.spawn(async move { (id, fut.await) });
        }

        let mut produced = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Some(_)))) => produced += 1,
                Ok((_, Ok(None))) => {}
                Ok((id, Err(e))) => log::error!("{label} tick failed for session {id}: {e}"),
                Err(e) => log::error!("{label} tick task aborted: {e}"),
            }
        }
        produced
    }
}

fn task_context(task: &Task) -> TaskContext {
    TaskContext {
        title: task.title.clone(),
        kind: task.kind,
        duration_minutes: task.duration_minutes,
        start_offset_minutes: task.start_offset_minutes,
    }
}

fn minutes_since(started_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    started_at
        .map(|start| (now - start).num_minutes().max(0))
        .and_then(|minutes| u32::try_from(minutes).ok())
        .unwrap_or(0)
}
