//! Prompt text for the advisory coach.

use std::fmt::Write;

use crate::advisory::AdvisoryRequest;

pub const SYSTEM_PROMPT: &str = "\
You are a study coach consulted only when a learner's state is ambiguous: \
not deeply focused, not critically or highly fatigued, and not in do-not-disturb mode.

Decide between staying silent and making one short suggestion.

Guidelines:
- Prefer silence when the learner is settling into a task or fatigue is falling.
- Suggest a short break (5 minutes) for moderate fatigue that keeps rising.
- Nudge back to the current task when focus is drifting or lost but fatigue is low.
- Respect autonomy: the more suggestions were ignored, the higher the bar for speaking.

Reply with ONLY a JSON object, no markdown:
{
  \"action_type\": \"silence | nudge | encourage | suggest_break | renegotiate_task\",
  \"message\": \"one or two sentences for the learner, or null\",
  \"reasoning\": \"short explanation\",
  \"schedule_changes\": { \"action\": \"add_break\", \"duration_minutes\": 5 } or null
}";

/// Render the learner context for one advisory call
#[must_use]
pub fn build_user_prompt(request: &AdvisoryRequest) -> String {
    let snapshot = &request.snapshot;
    let mut text = String::new();

    let _ = writeln!(text, "Learner state:");
    let _ = writeln!(
        text,
        "- focus: {} (score {:.2})",
        snapshot.focus_state, snapshot.focus_score
    );
    let _ = writeln!(
        text,
        "- fatigue: {} (score {:.2}, trend {})",
        snapshot.fatigue_level, snapshot.fatigue_score, request.fatigue_trend
    );
    let _ = writeln!(
        text,
        "- consecutive focused observations: {}",
        request.focus_streak
    );
    let _ = writeln!(
        text,
        "- ignored suggestions so far: {}",
        request.autonomy.ignore_count
    );
    let _ = writeln!(
        text,
        "- minutes into session: {}",
        request.minutes_into_session
    );

    match &request.current_task {
        Some(task) => {
            let _ = writeln!(
                text,
                "\nCurrent task: {} ({}, {} min)",
                task.title, task.kind, task.duration_minutes
            );
        }
        None => {
            let _ = writeln!(text, "\nCurrent task: none");
        }
    }

    if !request.upcoming_tasks.is_empty() {
        let _ = writeln!(text, "Up next:");
        for task in &request.upcoming_tasks {
            let _ = writeln!(
                text,
                "- {} ({}, {} min, starts at +{} min)",
                task.title, task.kind, task.duration_minutes, task.start_offset_minutes
            );
        }
    }

    text.push_str("\nDecide the single best coaching action.");
    text
}
