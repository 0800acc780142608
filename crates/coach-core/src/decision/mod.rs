//! Decision engine: one coaching action per decision tick.

pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use coach_ai::{AdvisoryError, AdvisoryRequest, Advisor, TaskContext, Trend};
use coach_storage::models::{AutonomyState, CoachAction, CoachActionKind, SignalSnapshot};

use crate::config::CoachConfig;
use rules::{select_rule, DecisionPolicy, RuleOutcome, ADVISORY_RULE};

/// Point-in-time view of a session that a decision is made from.
///
/// Built under the session lock and then evaluated without it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionContext {
    pub snapshot: SignalSnapshot,
    pub autonomy: AutonomyState,
    pub focus_streak: u32,
    pub fatigue_trend: Trend,
    pub minutes_into_session: u32,
    pub current_task: Option<TaskContext>,
    pub upcoming_tasks: Vec<TaskContext>,
}

impl DecisionContext {
    #[must_use]
    pub fn advisory_request(&self) -> AdvisoryRequest {
        AdvisoryRequest {
            snapshot: self.snapshot.clone(),
            autonomy: self.autonomy.clone(),
            fatigue_trend: self.fatigue_trend,
            focus_streak: self.focus_streak,
            minutes_into_session: self.minutes_into_session,
            current_task: self.current_task.clone(),
            upcoming_tasks: self.upcoming_tasks.clone(),
        }
    }
}

/// Result of one decision tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Rule that produced the action
    pub rule: &'static str,
    pub action: CoachAction,
}

pub struct DecisionEngine {
    policy: DecisionPolicy,
    advisor: Arc<dyn Advisor>,
    advisory_timeout: Duration,
    advisory_attempts: u32,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(config: &CoachConfig, advisor: Arc<dyn Advisor>) -> Self {
        Self {
            policy: DecisionPolicy::from_config(config),
            advisor,
            advisory_timeout: config.advisory_timeout(),
            advisory_attempts: config.advisory_attempts(),
        }
    }

    /// Override the per-attempt advisory timeout
    #[must_use]
    pub const fn with_advisory_timeout(mut self, timeout: Duration) -> Self {
        self.advisory_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Evaluate the rule table, falling back to the advisory source.
    ///
    /// Never fails: an unavailable advisory source yields Silence.
    pub async fn decide(&self, ctx: &DecisionContext) -> Decision {
        let decision = match select_rule(ctx, &self.policy) {
            Some(rule) => Decision {
                rule: rule.name,
                action: self.rule_action(rule.outcome, rule.reason),
            },
            None => Decision {
                rule: ADVISORY_RULE,
                action: self.consult_advisor(ctx).await,
            },
        };
        log::info!(
            "Session {}: {} via {} ({})",
            ctx.snapshot.session_id,
            decision.action.kind,
            decision.rule,
            decision.action.reason
        );
        decision
    }

    /// Re-apply the silencing rules after autonomy changed while `decision`
    /// was being made; a learner who just asked for quiet gets quiet.
    #[must_use]
    pub fn recheck(&self, ctx: &DecisionContext, decision: Decision) -> Decision {
        match select_rule(ctx, &self.policy) {
            Some(rule)
                if rule.outcome == RuleOutcome::Silence
                    && decision.action.kind != CoachActionKind::Silence =>
            {
                log::info!(
                    "Session {}: {} superseded by {}",
                    ctx.snapshot.session_id,
                    decision.action.kind,
                    rule.name
                );
                Decision {
                    rule: rule.name,
                    action: CoachAction::silence(rule.reason),
                }
            }
            _ => decision,
        }
    }

    fn rule_action(&self, outcome: RuleOutcome, reason: &str) -> CoachAction {
        match outcome {
            RuleOutcome::Silence => CoachAction::silence(reason),
            RuleOutcome::ForceBreak => {
                let minutes = self.policy.force_break_minutes;
                CoachAction::force_break(
                    reason,
                    format!("You're exhausted. Take a {minutes}-minute break now."),
                    minutes,
                )
            }
            RuleOutcome::SuggestBreak => {
                let minutes = self.policy.suggested_break_minutes;
                CoachAction::suggest(
                    reason,
                    Some(format!(
                        "You seem tired. How about a {minutes}-minute break?"
                    )),
                    Some(minutes),
                )
            }
        }
    }

    async fn consult_advisor(&self, ctx: &DecisionContext) -> CoachAction {
        let request = ctx.advisory_request();
        let session_id = ctx.snapshot.session_id;
        let mut last_error = AdvisoryError::Disabled;

        for attempt in 1..=self.advisory_attempts {
            let outcome = tokio::time::timeout(self.advisory_timeout, self.advisor.advise(&request))
                .await
                .unwrap_or(Err(AdvisoryError::Timeout(self.advisory_timeout)));

            match outcome {
                Ok(verdict) => return verdict.into_action(),
                Err(AdvisoryError::Disabled) => {
                    log::debug!("Session {session_id}: advisory source disabled");
                    return CoachAction::silence("Advisory source disabled");
                }
                Err(e) => {
                    log::warn!(
                        "Session {session_id}: advisory unavailable (attempt {attempt}/{}): {e}",
                        self.advisory_attempts
                    );
                    last_error = e;
                }
            }
        }

        CoachAction::silence(format!("Advisory unavailable: {last_error}"))
    }
}

#[cfg(test)]
mod tests;
