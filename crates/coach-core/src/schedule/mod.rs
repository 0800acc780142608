//! Schedule orchestration for one session.
//!
//! Tasks live in an ordered arena keyed by stable ids. Every mutation keeps the
//! timeline contiguous (`next.start == prior.start + prior.duration`), is
//! validated before anything changes, and is recorded in the
//! [`ScheduleHistory`] in enough detail to replay it.

mod history;

pub use history::ScheduleHistory;

use chrono::{DateTime, Utc};
use coach_storage::models::{ScheduleEventPayload, Task, TaskKind, TaskShift, TaskStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// One entry of an initial study plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub title: String,
    pub duration_minutes: u32,
}

impl PlannedTask {
    #[must_use]
    pub fn new(title: &str, duration_minutes: u32) -> Self {
        Self {
            title: title.to_string(),
            duration_minutes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    session_id: Uuid,
    tasks: Vec<Task>,
}

impl Schedule {
    /// Lay out a plan contiguously from offset 0
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` for an empty plan or a zero-length task
    pub fn from_plan(session_id: Uuid, plan: &[PlannedTask]) -> Result<Self> {
        if plan.is_empty() {
            return Err(CoreError::invariant(session_id, "plan has no tasks"));
        }

        let mut tasks = Vec::with_capacity(plan.len());
        let mut offset: u32 = 0;
        for (order, planned) in (0u32..).zip(plan) {
            if planned.duration_minutes == 0 {
                return Err(CoreError::invariant(
                    session_id,
                    format!("task '{}' has zero duration", planned.title),
                ));
            }
            tasks.push(Task {
                id: Uuid::new_v4(),
                session_id,
                order,
                title: planned.title.clone(),
                start_offset_minutes: offset,
                duration_minutes: planned.duration_minutes,
                status: TaskStatus::Pending,
                kind: TaskKind::Study,
            });
            offset = offset
                .checked_add(planned.duration_minutes)
                .ok_or_else(|| CoreError::invariant(session_id, "plan exceeds timeline range"))?;
        }
        Ok(Self { session_id, tasks })
    }

    /// Rebuild from persisted tasks, which must already be in order
    #[must_use]
    pub const fn from_tasks(session_id: Uuid, tasks: Vec<Task>) -> Self {
        Self { session_id, tasks }
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn task(&self, task_id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    #[must_use]
    pub fn total_duration_minutes(&self) -> u32 {
        self.tasks.iter().map(|t| t.duration_minutes).sum()
    }

    /// Whether every adjacent pair tiles the timeline and order numbers match positions
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.tasks
            .windows(2)
            .all(|w| w[1].start_offset_minutes == w[0].end_offset_minutes())
            && (0u32..).zip(&self.tasks).all(|(i, t)| t.order == i)
    }

    #[must_use]
    pub fn active_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == TaskStatus::Active)
    }

    /// The active task, or the first pending one
    #[must_use]
    pub fn current_task(&self) -> Option<&Task> {
        self.active_task().or_else(|| {
            self.tasks
                .iter()
                .find(|t| t.status == TaskStatus::Pending)
        })
    }

    /// Pending tasks after the current one, in order
    #[must_use]
    pub fn upcoming(&self, limit: usize) -> Vec<&Task> {
        let current = self.current_task().map(|t| t.id);
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending && Some(t.id) != current)
            .take(limit)
            .collect()
    }

    /// Whether every task is Completed or Skipped
    #[must_use]
    pub fn all_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_finished())
    }

    /// Insert a break in front of the first Pending or Active task at or after
    /// `at_or_after`, shifting it and everything behind it.
    ///
    /// An Active task at the insertion point goes back to Pending and resumes
    /// whole after the break. Returns the break task's id.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` for an unknown reference task, a zero
    /// duration, or when nothing is left to place the break in front of.
    pub fn insert_break(
        &mut self,
        history: &mut ScheduleHistory,
        at_or_after: Uuid,
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        if duration_minutes == 0 {
            return Err(self.invariant("break duration must be positive"));
        }
        let reference = self
            .index_of(at_or_after)
            .ok_or_else(|| self.invariant(format!("unknown reference task {at_or_after}")))?;
        let position = self.tasks[reference..]
            .iter()
            .position(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Active))
            .map(|p| p + reference)
            .ok_or_else(|| {
                self.invariant(format!(
                    "no pending or active task at or after {at_or_after}"
                ))
            })?;
        self.ensure_room(duration_minutes)?;

        let before = &mut self.tasks[position];
        let before_task_id = before.id;
        let start = before.start_offset_minutes;
        if before.status == TaskStatus::Active {
            before.status = TaskStatus::Pending;
        }

        let break_task = Task {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            order: 0,
            title: format!("Break ({duration_minutes} min)"),
            start_offset_minutes: start,
            duration_minutes,
            status: TaskStatus::Pending,
            kind: TaskKind::Break,
        };
        let break_task_id = break_task.id;
        self.tasks.insert(position, break_task);
        let shifts = self.shift_from(position + 1, duration_minutes);
        self.renumber();

        history.append(
            ScheduleEventPayload::BreakInserted {
                break_task_id,
                before_task_id,
                position: self.tasks[position].order,
                start_offset_minutes: start,
                duration_minutes,
            },
            now,
        );
        history.append(ScheduleEventPayload::TasksShifted { shifts }, now);

        log::info!(
            "Session {}: inserted {duration_minutes}-minute break at +{start} min before {before_task_id}",
            self.session_id
        );
        Ok(break_task_id)
    }

    /// Mark a task Completed and return its kind
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` for an unknown id and `InvariantViolation` if the
    /// task is already finished
    pub fn complete_task(
        &mut self,
        history: &mut ScheduleHistory,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TaskKind> {
        let index = self.unfinished_index(task_id)?;
        let task = &mut self.tasks[index];
        task.status = TaskStatus::Completed;
        let task_kind = task.kind;

        history.append(
            ScheduleEventPayload::TaskCompleted { task_id, task_kind },
            now,
        );
        log::info!("Session {}: completed {task_kind} task {task_id}", self.session_id);
        Ok(task_kind)
    }

    /// Lengthen an unfinished task, shifting every later task
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` for an unknown id and `InvariantViolation` for a
    /// finished task or a zero extension
    pub fn extend_task(
        &mut self,
        history: &mut ScheduleHistory,
        task_id: Uuid,
        added_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if added_minutes == 0 {
            return Err(self.invariant("extension must be positive"));
        }
        let index = self.unfinished_index(task_id)?;
        self.ensure_room(added_minutes)?;

        self.tasks[index].duration_minutes += added_minutes;
        let shifts = self.shift_from(index + 1, added_minutes);

        history.append(
            ScheduleEventPayload::TaskExtended {
                task_id,
                added_minutes,
            },
            now,
        );
        if !shifts.is_empty() {
            history.append(ScheduleEventPayload::TasksShifted { shifts }, now);
        }
        log::info!(
            "Session {}: extended task {task_id} by {added_minutes} min",
            self.session_id
        );
        Ok(())
    }

    /// Mark an unfinished task Skipped; the timeline is left as is
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` for an unknown id and `InvariantViolation` if the
    /// task is already finished
    pub fn skip_task(
        &mut self,
        history: &mut ScheduleHistory,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TaskKind> {
        let index = self.unfinished_index(task_id)?;
        self.tasks[index].status = TaskStatus::Skipped;

        history.append(ScheduleEventPayload::TaskSkipped { task_id }, now);
        log::info!("Session {}: skipped task {task_id}", self.session_id);
        Ok(self.tasks[index].kind)
    }

    /// Move a pending task to `to_position` and re-time the tasks it passes.
    ///
    /// Everything between the old and new position must still be Pending.
    /// The affected span keeps its start and length, so the rest of the
    /// timeline is untouched. Moving a task onto its own position is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` for an unknown id and `InvariantViolation` for a
    /// position out of range or a task in the way that is not Pending
    pub fn move_task(
        &mut self,
        history: &mut ScheduleHistory,
        task_id: Uuid,
        to_position: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let from = self.index_of(task_id).ok_or(CoreError::TaskNotFound {
            session_id: self.session_id,
            task_id,
        })?;
        let to = usize::try_from(to_position)
            .ok()
            .filter(|&p| p < self.tasks.len())
            .ok_or_else(|| self.invariant(format!("position {to_position} is out of range")))?;
        if from == to {
            return Ok(());
        }

        let (low, high) = (from.min(to), from.max(to));
        if let Some(blocking) = self.tasks[low..=high]
            .iter()
            .find(|t| t.status != TaskStatus::Pending)
        {
            return Err(self.invariant(format!(
                "task {} is {}, only pending tasks can be reordered",
                blocking.id, blocking.status
            )));
        }

        let from_position = self.tasks[from].order;
        let span_start = self.tasks[low].start_offset_minutes;
        let task = self.tasks.remove(from);
        self.tasks.insert(to, task);

        let mut offset = span_start;
        let mut shifts = Vec::new();
        for task in &mut self.tasks[low..=high] {
            let from_offset = task.start_offset_minutes;
            task.start_offset_minutes = offset;
            offset += task.duration_minutes;
            if from_offset != task.start_offset_minutes {
                shifts.push(TaskShift {
                    task_id: task.id,
                    from_offset_minutes: from_offset,
                    to_offset_minutes: task.start_offset_minutes,
                    delta_minutes: i64::from(task.start_offset_minutes) - i64::from(from_offset),
                });
            }
        }
        self.renumber();

        history.append(
            ScheduleEventPayload::TaskMoved {
                task_id,
                from_position,
                to_position,
            },
            now,
        );
        if !shifts.is_empty() {
            history.append(ScheduleEventPayload::TasksShifted { shifts }, now);
        }
        log::info!(
            "Session {}: moved task {task_id} from position {from_position} to {to_position}",
            self.session_id
        );
        Ok(())
    }

    /// Make `task_id` the active task
    pub(crate) fn activate(&mut self, task_id: Uuid) -> Result<()> {
        let index = self.unfinished_index(task_id)?;
        for task in &mut self.tasks {
            if task.status == TaskStatus::Active {
                task.status = TaskStatus::Pending;
            }
        }
        self.tasks[index].status = TaskStatus::Active;
        Ok(())
    }

    /// Activate the first pending task unless one is already active
    pub(crate) fn activate_next(&mut self) -> Option<&Task> {
        if self.active_task().is_none() {
            if let Some(next) = self
                .tasks
                .iter_mut()
                .find(|t| t.status == TaskStatus::Pending)
            {
                next.status = TaskStatus::Active;
            }
        }
        self.active_task()
    }

    fn index_of(&self, task_id: Uuid) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    fn unfinished_index(&self, task_id: Uuid) -> Result<usize> {
        let index = self.index_of(task_id).ok_or(CoreError::TaskNotFound {
            session_id: self.session_id,
            task_id,
        })?;
        let status = self.tasks[index].status;
        if status.is_finished() {
            return Err(self.invariant(format!("task {task_id} is already {status}")));
        }
        Ok(index)
    }

    fn ensure_room(&self, minutes: u32) -> Result<()> {
        let end = self.tasks.last().map_or(0, Task::end_offset_minutes);
        end.checked_add(minutes)
            .map(|_| ())
            .ok_or_else(|| self.invariant("timeline would overflow"))
    }

    fn shift_from(&mut self, from: usize, minutes: u32) -> Vec<TaskShift> {
        self.tasks
            .iter_mut()
            .skip(from)
            .map(|task| {
                let from_offset = task.start_offset_minutes;
                task.start_offset_minutes += minutes;
                TaskShift {
                    task_id: task.id,
                    from_offset_minutes: from_offset,
                    to_offset_minutes: task.start_offset_minutes,
                    delta_minutes: i64::from(minutes),
                }
            })
            .collect()
    }

    fn renumber(&mut self) {
        for (order, task) in (0u32..).zip(self.tasks.iter_mut()) {
            task.order = order;
        }
    }

    fn invariant(&self, reason: impl Into<String>) -> CoreError {
        CoreError::invariant(self.session_id, reason)
    }
}

#[cfg(test)]
mod tests;
