//! Autonomy tracking: how often the learner has waved the coach off.
//!
//! These two functions are the only writers of [`AutonomyState`].

use coach_storage::models::{AutonomyState, ResponseOutcome};

/// Apply a learner response to the autonomy state
pub fn record_response(state: &mut AutonomyState, outcome: ResponseOutcome) -> &AutonomyState {
    match outcome {
        ResponseOutcome::Ignored => {
            state.ignore_count = state.ignore_count.saturating_add(1);
        }
        ResponseOutcome::Accepted | ResponseOutcome::BreakCompleted => {
            state.ignore_count = 0;
        }
    }
    log::debug!(
        "Session {}: {outcome} -> ignore count {}",
        state.session_id,
        state.ignore_count
    );
    state
}

pub fn set_do_not_disturb(state: &mut AutonomyState, enabled: bool) -> &AutonomyState {
    state.do_not_disturb = enabled;
    log::info!(
        "Session {}: do-not-disturb {}",
        state.session_id,
        if enabled { "on" } else { "off" }
    );
    state
}
