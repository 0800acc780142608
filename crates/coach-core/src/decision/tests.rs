use super::*;
use async_trait::async_trait;
use chrono::Utc;
use coach_ai::AdvisoryVerdict;
use coach_storage::models::{FatigueLevel, FocusState, SignalSource, TaskKind};
use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

// ==================== Advisor stubs ====================

struct FixedAdvisor(AdvisoryVerdict);

#[async_trait]
impl Advisor for FixedAdvisor {
    async fn advise(&self, _request: &AdvisoryRequest) -> Result<AdvisoryVerdict, AdvisoryError> {
        Ok(self.0.clone())
    }
}

/// Fails a fixed number of times, then answers with silence
#[derive(Default)]
struct FlakyAdvisor {
    failures: u32,
    calls: AtomicU32,
}

#[async_trait]
impl Advisor for FlakyAdvisor {
    async fn advise(&self, _request: &AdvisoryRequest) -> Result<AdvisoryVerdict, AdvisoryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(AdvisoryError::Provider(anyhow::anyhow!("connection refused")))
        } else {
            Ok(AdvisoryVerdict::Silence {
                reason: "recovered".to_string(),
            })
        }
    }
}

#[derive(Default)]
struct SleepyAdvisor {
    calls: AtomicU32,
}

#[async_trait]
impl Advisor for SleepyAdvisor {
    async fn advise(&self, _request: &AdvisoryRequest) -> Result<AdvisoryVerdict, AdvisoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(AdvisoryVerdict::Suggest {
            reason: "too late".to_string(),
            message: None,
            duration_minutes: None,
        })
    }
}

/// Panics if consulted; for contexts a deterministic rule must settle
struct UnreachableAdvisor;

#[async_trait]
impl Advisor for UnreachableAdvisor {
    async fn advise(&self, _request: &AdvisoryRequest) -> Result<AdvisoryVerdict, AdvisoryError> {
        panic!("advisory source consulted for a rule-decided context")
    }
}

// ==================== Helpers ====================

fn context(focus: FocusState, fatigue: FatigueLevel) -> DecisionContext {
    let session_id = Uuid::new_v4();
    DecisionContext {
        snapshot: SignalSnapshot {
            user_id: "learner-1".to_string(),
            session_id,
            timestamp: Utc::now(),
            focus_state: focus,
            focus_score: 0.5,
            focus_source: SignalSource::Measured,
            fatigue_level: fatigue,
            fatigue_score: 0.5,
            fatigue_source: SignalSource::Measured,
        },
        autonomy: AutonomyState::new("learner-1", session_id),
        focus_streak: u32::from(focus == FocusState::Focused),
        fatigue_trend: Trend::Steady,
        minutes_into_session: 20,
        current_task: Some(TaskContext {
            title: "Read chapter 3".to_string(),
            kind: TaskKind::Study,
            duration_minutes: 25,
            start_offset_minutes: 0,
        }),
        upcoming_tasks: Vec::new(),
    }
}

fn engine(advisor: Arc<dyn Advisor>) -> DecisionEngine {
    DecisionEngine::new(&CoachConfig::default(), advisor)
        .with_advisory_timeout(Duration::from_millis(50))
}

// ==================== Rule table ====================

#[test]
fn test_rule_table_order() {
    let names: Vec<_> = rules::RULES.iter().map(|r| r.name).collect();
    assert_eq!(
        names,
        [
            "do_not_disturb",
            "ignore_threshold",
            "critical_fatigue",
            "deep_focus",
            "high_fatigue"
        ]
    );
}

#[test]
fn test_moderate_state_falls_through_to_advisory() {
    let ctx = context(FocusState::Drifting, FatigueLevel::Moderate);
    assert!(select_rule(&ctx, &DecisionPolicy::default()).is_none());
}

#[test]
fn test_deep_focus_needs_full_window() {
    let policy = DecisionPolicy::default();
    let mut ctx = context(FocusState::Focused, FatigueLevel::Alert);
    ctx.focus_streak = 2;
    assert!(select_rule(&ctx, &policy).is_none());

    ctx.focus_streak = 3;
    assert_eq!(select_rule(&ctx, &policy).map(|r| r.name), Some("deep_focus"));
}

#[test]
fn test_deep_focus_outranks_high_fatigue() {
    let mut ctx = context(FocusState::Focused, FatigueLevel::High);
    ctx.focus_streak = 4;
    assert_eq!(
        select_rule(&ctx, &DecisionPolicy::default()).map(|r| r.name),
        Some("deep_focus")
    );
}

// ==================== Engine ====================

#[tokio::test]
async fn test_critical_fatigue_forces_break() {
    let engine = engine(Arc::new(UnreachableAdvisor));
    let decision = engine
        .decide(&context(FocusState::Focused, FatigueLevel::Critical))
        .await;

    assert_eq!(decision.rule, "critical_fatigue");
    assert_eq!(decision.action.kind, CoachActionKind::ForceBreak);
    assert_eq!(decision.action.suggested_duration_minutes, Some(10));
    assert!(decision.action.message.is_some());
}

#[tokio::test]
async fn test_do_not_disturb_silences_critical_fatigue() {
    let mut ctx = context(FocusState::Lost, FatigueLevel::Critical);
    ctx.autonomy.do_not_disturb = true;

    let decision = engine(Arc::new(UnreachableAdvisor)).decide(&ctx).await;
    assert_eq!(decision.rule, "do_not_disturb");
    assert_eq!(decision.action.kind, CoachActionKind::Silence);
}

#[tokio::test]
async fn test_ignore_threshold_silences_critical_fatigue() {
    let mut ctx = context(FocusState::Lost, FatigueLevel::Critical);
    ctx.autonomy.ignore_count = 3;

    let decision = engine(Arc::new(UnreachableAdvisor)).decide(&ctx).await;
    assert_eq!(decision.rule, "ignore_threshold");
    assert_eq!(decision.action.kind, CoachActionKind::Silence);
}

#[tokio::test]
async fn test_high_fatigue_suggests_break() {
    let decision = engine(Arc::new(UnreachableAdvisor))
        .decide(&context(FocusState::Drifting, FatigueLevel::High))
        .await;
    assert_eq!(decision.rule, "high_fatigue");
    assert_eq!(decision.action.kind, CoachActionKind::Suggest);
    assert_eq!(decision.action.suggested_duration_minutes, Some(5));
}

#[tokio::test]
async fn test_advisory_verdict_is_used() {
    let advisor = FixedAdvisor(AdvisoryVerdict::Suggest {
        reason: "fatigue creeping up".to_string(),
        message: Some("Stretch?".to_string()),
        duration_minutes: Some(3),
    });
    let decision = engine(Arc::new(advisor))
        .decide(&context(FocusState::Drifting, FatigueLevel::Moderate))
        .await;

    assert_eq!(decision.rule, ADVISORY_RULE);
    assert_eq!(decision.action.kind, CoachActionKind::Suggest);
    assert_eq!(decision.action.suggested_duration_minutes, Some(3));
}

#[tokio::test]
async fn test_advisory_failure_retries_once() {
    let advisor = Arc::new(FlakyAdvisor {
        failures: 1,
        ..FlakyAdvisor::default()
    });
    let decision = engine(advisor.clone())
        .decide(&context(FocusState::Lost, FatigueLevel::Alert))
        .await;

    assert_eq!(advisor.calls.load(Ordering::SeqCst), 2);
    assert_eq!(decision.action.reason, "recovered");
}

#[tokio::test]
async fn test_advisory_failure_twice_is_silence() {
    let advisor = Arc::new(FlakyAdvisor {
        failures: 5,
        ..FlakyAdvisor::default()
    });
    let decision = engine(advisor.clone())
        .decide(&context(FocusState::Lost, FatigueLevel::Alert))
        .await;

    assert_eq!(advisor.calls.load(Ordering::SeqCst), 2);
    assert_eq!(decision.action.kind, CoachActionKind::Silence);
    assert!(decision.action.reason.contains("connection refused"));
}

#[tokio::test]
async fn test_advisory_timeout_is_silence() {
    let advisor = Arc::new(SleepyAdvisor::default());
    let started = std::time::Instant::now();
    let decision = engine(advisor.clone())
        .decide(&context(FocusState::Drifting, FatigueLevel::Moderate))
        .await;

    assert_eq!(decision.action.kind, CoachActionKind::Silence);
    assert!(decision.action.reason.contains("timed out"));
    assert_eq!(advisor.calls.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_no_retry_when_retries_disabled() {
    let config = CoachConfig {
        advisory_retries: 0,
        ..CoachConfig::default()
    };
    let advisor = Arc::new(FlakyAdvisor {
        failures: 5,
        ..FlakyAdvisor::default()
    });
    DecisionEngine::new(&config, advisor.clone())
        .decide(&context(FocusState::Drifting, FatigueLevel::Moderate))
        .await;
    assert_eq!(advisor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_disabled_advisor_is_silence_without_retry() {
    let decision = engine(Arc::new(coach_ai::DisabledAdvisor))
        .decide(&context(FocusState::Drifting, FatigueLevel::Moderate))
        .await;
    assert_eq!(decision.rule, ADVISORY_RULE);
    assert_eq!(decision.action.kind, CoachActionKind::Silence);
}

#[test]
fn test_recheck_silences_when_do_not_disturb_was_enabled() {
    let engine = engine(Arc::new(UnreachableAdvisor));
    let mut ctx = context(FocusState::Drifting, FatigueLevel::Moderate);
    let suggested = Decision {
        rule: ADVISORY_RULE,
        action: CoachAction::suggest("advisory", None, None),
    };

    assert_eq!(engine.recheck(&ctx, suggested.clone()), suggested);

    ctx.autonomy.do_not_disturb = true;
    let rechecked = engine.recheck(&ctx, suggested);
    assert_eq!(rechecked.rule, "do_not_disturb");
    assert_eq!(rechecked.action.kind, CoachActionKind::Silence);
}

#[test]
fn test_advisory_request_mirrors_context() {
    let ctx = context(FocusState::Drifting, FatigueLevel::Moderate);
    let request = ctx.advisory_request();
    assert_eq!(request.snapshot, ctx.snapshot);
    assert_eq!(request.current_task, ctx.current_task);
    assert_eq!(request.minutes_into_session, 20);
}

// ==================== Priority properties ====================

fn arb_context() -> impl Strategy<Value = DecisionContext> {
    let focus = prop_oneof![
        Just(FocusState::Focused),
        Just(FocusState::Drifting),
        Just(FocusState::Lost),
    ];
    let fatigue = prop_oneof![
        Just(FatigueLevel::Alert),
        Just(FatigueLevel::Moderate),
        Just(FatigueLevel::High),
        Just(FatigueLevel::Critical),
    ];
    (focus, fatigue, 0u32..6, 0u32..6, any::<bool>()).prop_map(
        |(focus, fatigue, ignore_count, streak, dnd)| {
            let mut ctx = context(focus, fatigue);
            ctx.autonomy.ignore_count = ignore_count;
            ctx.autonomy.do_not_disturb = dnd;
            ctx.focus_streak = if focus == FocusState::Focused { streak } else { 0 };
            ctx
        },
    )
}

fn expected_kind(ctx: &DecisionContext, policy: &DecisionPolicy) -> Option<RuleOutcome> {
    if ctx.autonomy.do_not_disturb || ctx.autonomy.ignore_count >= policy.ignore_threshold {
        return Some(RuleOutcome::Silence);
    }
    if ctx.snapshot.fatigue_level == FatigueLevel::Critical {
        return Some(RuleOutcome::ForceBreak);
    }
    if ctx.focus_streak >= policy.deep_focus_window {
        return Some(RuleOutcome::Silence);
    }
    if ctx.snapshot.fatigue_level == FatigueLevel::High {
        return Some(RuleOutcome::SuggestBreak);
    }
    None
}

proptest! {
    #[test]
    fn prop_rule_selection_follows_priority(ctx in arb_context()) {
        let policy = DecisionPolicy::default();
        let selected = select_rule(&ctx, &policy).map(|r| r.outcome);
        prop_assert_eq!(selected, expected_kind(&ctx, &policy));
    }

    #[test]
    fn prop_decide_is_total_and_respects_overrides(ctx in arb_context()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let engine = engine(Arc::new(FixedAdvisor(AdvisoryVerdict::Suggest {
            reason: "advisory".to_string(),
            message: None,
            duration_minutes: None,
        })));
        let decision = runtime.block_on(engine.decide(&ctx));

        if ctx.autonomy.do_not_disturb {
            prop_assert_eq!(decision.action.kind, CoachActionKind::Silence);
        } else if ctx.autonomy.ignore_count >= 3 {
            prop_assert_eq!(decision.action.kind, CoachActionKind::Silence);
        } else if ctx.snapshot.fatigue_level == FatigueLevel::Critical {
            prop_assert_eq!(decision.action.kind, CoachActionKind::ForceBreak);
        }
        prop_assert!(!decision.rule.is_empty());
    }
}
