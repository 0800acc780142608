use super::*;
use coach_storage::models::{ScheduleEvent, ScheduleEventKind};
use proptest::prelude::*;

fn plan(durations: &[u32]) -> Vec<PlannedTask> {
    durations
        .iter()
        .enumerate()
        .map(|(i, d)| PlannedTask::new(&format!("Task {i}"), *d))
        .collect()
}

fn schedule(durations: &[u32]) -> (Schedule, ScheduleHistory) {
    let session_id = Uuid::new_v4();
    (
        Schedule::from_plan(session_id, &plan(durations)).unwrap(),
        ScheduleHistory::new(session_id),
    )
}

fn offsets(schedule: &Schedule) -> Vec<u32> {
    schedule
        .tasks()
        .iter()
        .map(|t| t.start_offset_minutes)
        .collect()
}

// ==================== Plan layout ====================

#[test]
fn test_plan_is_laid_out_contiguously() {
    let (schedule, _) = schedule(&[25, 10, 30]);
    assert_eq!(offsets(&schedule), [0, 25, 35]);
    assert_eq!(schedule.total_duration_minutes(), 65);
    assert!(schedule.is_contiguous());
    assert!(schedule
        .tasks()
        .iter()
        .all(|t| t.status == TaskStatus::Pending && t.kind == TaskKind::Study));
}

#[test]
fn test_invalid_plans_are_rejected() {
    let id = Uuid::new_v4();
    assert!(matches!(
        Schedule::from_plan(id, &[]),
        Err(CoreError::InvariantViolation { .. })
    ));
    assert!(matches!(
        Schedule::from_plan(id, &plan(&[25, 0])),
        Err(CoreError::InvariantViolation { .. })
    ));
}

// ==================== InsertBreak ====================

#[test]
fn test_insert_break_before_active_task() {
    let (mut schedule, mut history) = schedule(&[25, 10, 30]);
    let first = schedule.tasks()[0].id;
    let second = schedule.tasks()[1].id;
    schedule.activate(first).unwrap();
    schedule
        .complete_task(&mut history, first, Utc::now())
        .unwrap();
    schedule.activate(second).unwrap();

    let break_id = schedule
        .insert_break(&mut history, second, 5, Utc::now())
        .unwrap();

    let tasks = schedule.tasks();
    assert_eq!(tasks.len(), 4);
    assert_eq!(tasks[1].id, break_id);
    assert_eq!(tasks[1].kind, TaskKind::Break);
    assert_eq!(tasks[1].duration_minutes, 5);
    // Interrupted task resumes whole after the break
    assert_eq!(tasks[2].id, second);
    assert_eq!(tasks[2].status, TaskStatus::Pending);
    assert_eq!(tasks[2].duration_minutes, 10);
    assert_eq!(offsets(&schedule), [0, 25, 30, 40]);
    assert!(schedule.is_contiguous());
    assert_eq!(schedule.total_duration_minutes(), 70);
}

#[test]
fn test_insert_break_emits_reconstructable_events() {
    let (mut schedule, mut history) = schedule(&[20, 20]);
    let first = schedule.tasks()[0].id;
    let second = schedule.tasks()[1].id;

    let break_id = schedule
        .insert_break(&mut history, first, 10, Utc::now())
        .unwrap();

    let kinds: Vec<_> = history.events().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        [ScheduleEventKind::BreakInserted, ScheduleEventKind::TasksShifted]
    );
    assert_eq!(
        history.events()[0].payload,
        ScheduleEventPayload::BreakInserted {
            break_task_id: break_id,
            before_task_id: first,
            position: 0,
            start_offset_minutes: 0,
            duration_minutes: 10,
        }
    );
    let ScheduleEventPayload::TasksShifted { shifts } = &history.events()[1].payload else {
        panic!("expected TasksShifted");
    };
    let shifted: Vec<_> = shifts
        .iter()
        .map(|s| (s.task_id, s.from_offset_minutes, s.to_offset_minutes))
        .collect();
    assert_eq!(shifted, [(first, 0, 10), (second, 20, 30)]);
    assert!(shifts.iter().all(|s| s.delta_minutes == 10));
    assert_eq!(history.events()[1].sequence, 1);
}

#[test]
fn test_insert_break_skips_finished_tasks_after_reference() {
    let (mut schedule, mut history) = schedule(&[10, 10, 10]);
    let ids: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();
    schedule.skip_task(&mut history, ids[1], Utc::now()).unwrap();
    schedule.complete_task(&mut history, ids[0], Utc::now()).unwrap();

    schedule
        .insert_break(&mut history, ids[0], 5, Utc::now())
        .unwrap();
    assert_eq!(schedule.tasks()[2].kind, TaskKind::Break);
    assert_eq!(schedule.tasks()[3].id, ids[2]);
    assert!(schedule.is_contiguous());
}

#[test]
fn test_insert_break_rejections_leave_schedule_unchanged() {
    let (mut schedule, mut history) = schedule(&[10, 10]);
    let ids: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();
    let before = schedule.tasks().to_vec();

    let unknown = schedule.insert_break(&mut history, Uuid::new_v4(), 5, Utc::now());
    assert!(matches!(unknown, Err(CoreError::InvariantViolation { .. })));

    let zero = schedule.insert_break(&mut history, ids[0], 0, Utc::now());
    assert!(matches!(zero, Err(CoreError::InvariantViolation { .. })));

    assert_eq!(schedule.tasks(), before.as_slice());
    assert!(history.is_empty());

    schedule.complete_task(&mut history, ids[0], Utc::now()).unwrap();
    schedule.complete_task(&mut history, ids[1], Utc::now()).unwrap();
    let exhausted = schedule.insert_break(&mut history, ids[0], 5, Utc::now());
    assert!(matches!(exhausted, Err(CoreError::InvariantViolation { .. })));
    assert_eq!(history.len(), 2);
}

// ==================== Complete / extend / skip ====================

#[test]
fn test_complete_task_records_kind() {
    let (mut schedule, mut history) = schedule(&[10, 10]);
    let first = schedule.tasks()[0].id;
    let break_id = schedule
        .insert_break(&mut history, first, 5, Utc::now())
        .unwrap();

    let kind = schedule
        .complete_task(&mut history, break_id, Utc::now())
        .unwrap();
    assert_eq!(kind, TaskKind::Break);
    assert_eq!(
        history.events().last().map(|e| e.payload.clone()),
        Some(ScheduleEventPayload::TaskCompleted {
            task_id: break_id,
            task_kind: TaskKind::Break
        })
    );

    let again = schedule.complete_task(&mut history, break_id, Utc::now());
    assert!(matches!(again, Err(CoreError::InvariantViolation { .. })));

    let unknown = schedule.complete_task(&mut history, Uuid::new_v4(), Utc::now());
    assert!(matches!(unknown, Err(CoreError::TaskNotFound { .. })));
}

#[test]
fn test_extend_task_shifts_later_tasks() {
    let (mut schedule, mut history) = schedule(&[10, 20, 30]);
    let ids: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();

    schedule
        .extend_task(&mut history, ids[1], 15, Utc::now())
        .unwrap();
    assert_eq!(offsets(&schedule), [0, 10, 45]);
    assert_eq!(schedule.tasks()[1].duration_minutes, 35);
    assert!(schedule.is_contiguous());
    assert_eq!(history.len(), 2);

    // Extending the last task shifts nothing, so only one event
    schedule
        .extend_task(&mut history, ids[2], 5, Utc::now())
        .unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.events()[2].kind(), ScheduleEventKind::TaskExtended);
}

#[test]
fn test_skip_task_keeps_timeline() {
    let (mut schedule, mut history) = schedule(&[10, 20]);
    let first = schedule.tasks()[0].id;
    schedule.skip_task(&mut history, first, Utc::now()).unwrap();

    assert_eq!(schedule.tasks()[0].status, TaskStatus::Skipped);
    assert_eq!(offsets(&schedule), [0, 10]);
    assert_eq!(history.events()[0].kind(), ScheduleEventKind::TaskSkipped);
    assert!(schedule.skip_task(&mut history, first, Utc::now()).is_err());
}

#[test]
fn test_activation_and_current_task() {
    let (mut schedule, mut history) = schedule(&[10, 20, 30]);
    let ids: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();

    assert_eq!(schedule.current_task().map(|t| t.id), Some(ids[0]));
    assert!(schedule.active_task().is_none());
    assert_eq!(schedule.activate_next().map(|t| t.id), Some(ids[0]));
    assert_eq!(schedule.upcoming(5).len(), 2);

    schedule.complete_task(&mut history, ids[0], Utc::now()).unwrap();
    assert!(schedule.active_task().is_none());
    assert_eq!(schedule.activate_next().map(|t| t.id), Some(ids[1]));

    schedule.complete_task(&mut history, ids[1], Utc::now()).unwrap();
    schedule.skip_task(&mut history, ids[2], Utc::now()).unwrap();
    assert!(schedule.activate_next().is_none());
    assert!(schedule.all_finished());
}

#[test]
fn test_history_since() {
    let (mut schedule, mut history) = schedule(&[10, 20]);
    let ids: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();
    schedule.skip_task(&mut history, ids[0], Utc::now()).unwrap();
    let mark = history.len();
    schedule
        .extend_task(&mut history, ids[1], 5, Utc::now())
        .unwrap();

    assert_eq!(history.since(mark).len(), 1);
    assert!(history.since(10).is_empty());
}

#[test]
fn test_unpersisted_tracks_stored_prefix() {
    let (mut schedule, mut history) = schedule(&[10, 20]);
    let ids: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();
    schedule
        .extend_task(&mut history, ids[0], 5, Utc::now())
        .unwrap();
    assert_eq!(history.unpersisted().len(), 2);

    history.mark_persisted();
    assert_eq!(history.unpersisted().len(), 1);
    assert_eq!(history.unpersisted()[0].sequence, 1);
    history.mark_persisted();
    history.mark_persisted();
    assert!(history.unpersisted().is_empty());

    let reloaded = ScheduleHistory::from_events(Uuid::new_v4(), history.events().to_vec());
    assert!(reloaded.unpersisted().is_empty());
}

// ==================== Reordering ====================

#[test]
fn test_move_task_later_retimes_span() {
    let (mut schedule, mut history) = schedule(&[10, 20, 30, 40]);
    let ids: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();

    schedule
        .move_task(&mut history, ids[0], 2, Utc::now())
        .unwrap();

    let order: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();
    assert_eq!(order, [ids[1], ids[2], ids[0], ids[3]]);
    assert_eq!(offsets(&schedule), [0, 20, 50, 60]);
    assert!(schedule.is_contiguous());
    assert_eq!(schedule.total_duration_minutes(), 100);

    let kinds: Vec<_> = history.events().iter().map(ScheduleEvent::kind).collect();
    assert_eq!(kinds, [ScheduleEventKind::TaskMoved, ScheduleEventKind::TasksShifted]);
    let ScheduleEventPayload::TasksShifted { shifts } = &history.events()[1].payload else {
        panic!("expected shifts");
    };
    assert_eq!(shifts.len(), 3);
    assert_eq!(shifts[0].delta_minutes, -10);
    assert_eq!(shifts[2].delta_minutes, 50);
}

#[test]
fn test_move_task_earlier_and_noop() {
    let (mut schedule, mut history) = schedule(&[10, 20, 30]);
    let ids: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();

    schedule
        .move_task(&mut history, ids[2], 0, Utc::now())
        .unwrap();
    assert_eq!(offsets(&schedule), [0, 30, 40]);
    assert_eq!(schedule.tasks()[0].id, ids[2]);
    assert_eq!(schedule.tasks()[0].order, 0);
    assert_eq!(
        history.events()[0].payload,
        ScheduleEventPayload::TaskMoved {
            task_id: ids[2],
            from_position: 2,
            to_position: 0,
        }
    );

    let events = history.len();
    schedule
        .move_task(&mut history, ids[2], 0, Utc::now())
        .unwrap();
    assert_eq!(history.len(), events);
}

#[test]
fn test_move_task_rejects_started_work() {
    let (mut schedule, mut history) = schedule(&[10, 20, 30]);
    let ids: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();
    schedule.activate_next();
    let before = schedule.tasks().to_vec();

    // Cannot jump in front of the running task, nor move it
    assert!(schedule.move_task(&mut history, ids[2], 0, Utc::now()).is_err());
    assert!(schedule.move_task(&mut history, ids[0], 1, Utc::now()).is_err());
    assert!(schedule.move_task(&mut history, ids[1], 3, Utc::now()).is_err());
    assert!(matches!(
        schedule.move_task(&mut history, Uuid::new_v4(), 1, Utc::now()),
        Err(CoreError::TaskNotFound { .. })
    ));
    assert_eq!(schedule.tasks(), before.as_slice());
    assert!(history.is_empty());

    schedule
        .move_task(&mut history, ids[2], 1, Utc::now())
        .unwrap();
    assert_eq!(offsets(&schedule), [0, 10, 40]);
}

// ==================== Properties ====================

proptest! {
    #[test]
    fn prop_insert_break_keeps_contiguity_and_conserves_duration(
        durations in prop::collection::vec(1u32..90, 1..8),
        finished in 0usize..8,
        reference in 0usize..8,
        minutes in 1u32..60,
    ) {
        let (mut schedule, mut history) = schedule(&durations);
        let ids: Vec<_> = schedule.tasks().iter().map(|t| t.id).collect();
        let finished = finished.min(ids.len() - 1);
        for id in &ids[..finished] {
            schedule.complete_task(&mut history, *id, Utc::now()).unwrap();
        }
        let reference = ids[reference.min(ids.len() - 1)];
        let total_before = schedule.total_duration_minutes();
        let events_before = history.len();
        let prefix_before = history.events().to_vec();

        schedule.insert_break(&mut history, reference, minutes, Utc::now()).unwrap();

        prop_assert!(schedule.is_contiguous());
        prop_assert_eq!(schedule.total_duration_minutes(), total_before + minutes);
        prop_assert_eq!(history.len(), events_before + 2);
        prop_assert_eq!(&history.events()[..events_before], prefix_before.as_slice());
        prop_assert_eq!(
            schedule.tasks().iter().filter(|t| t.kind == TaskKind::Break).count(),
            1
        );
    }

    #[test]
    fn prop_mutation_sequences_keep_contiguity(
        durations in prop::collection::vec(1u32..60, 1..6),
        ops in prop::collection::vec((0u8..4, 0usize..10, 1u32..30), 0..12),
    ) {
        let (mut schedule, mut history) = schedule(&durations);
        for (op, index, minutes) in ops {
            let Some(task_id) = schedule.tasks().get(index % schedule.tasks().len()).map(|t| t.id) else {
                continue;
            };
            let before = schedule.tasks().to_vec();
            let result = match op {
                0 => schedule.insert_break(&mut history, task_id, minutes, Utc::now()).map(|_| ()),
                1 => schedule.extend_task(&mut history, task_id, minutes, Utc::now()),
                2 => schedule.skip_task(&mut history, task_id, Utc::now()).map(|_| ()),
                _ => schedule.move_task(&mut history, task_id, minutes % 8, Utc::now()),
            };
            if result.is_err() {
                prop_assert_eq!(schedule.tasks(), before.as_slice());
            }
            prop_assert!(schedule.is_contiguous());
        }
        let sequences: Vec<u64> = history.events().iter().map(|e| e.sequence).collect();
        let expected: Vec<u64> = (0..sequences.len() as u64).collect();
        prop_assert_eq!(sequences, expected);
    }
}
