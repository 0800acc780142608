//! The fixed priority policy as an ordered rule table.
//!
//! Rules are evaluated top to bottom and the first match wins. When none
//! matches, the engine consults the advisory source.

use coach_storage::models::FatigueLevel;

use super::DecisionContext;
use crate::config::CoachConfig;

/// Thresholds the rule predicates read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionPolicy {
    pub ignore_threshold: u32,
    pub deep_focus_window: u32,
    pub force_break_minutes: u32,
    pub suggested_break_minutes: u32,
}

impl DecisionPolicy {
    #[must_use]
    pub const fn from_config(config: &CoachConfig) -> Self {
        Self {
            ignore_threshold: config.ignore_threshold,
            deep_focus_window: config.deep_focus_window,
            force_break_minutes: config.force_break_minutes,
            suggested_break_minutes: config.suggested_break_minutes,
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::from_config(&CoachConfig::default())
    }
}

/// What a matching rule produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Silence,
    ForceBreak,
    SuggestBreak,
}

pub struct Rule {
    pub name: &'static str,
    pub reason: &'static str,
    pub predicate: fn(&DecisionContext, &DecisionPolicy) -> bool,
    pub outcome: RuleOutcome,
}

/// Name recorded when no rule matched and the advisory source decided
pub const ADVISORY_RULE: &str = "advisory";

pub static RULES: [Rule; 5] = [
    Rule {
        name: "do_not_disturb",
        reason: "Do not disturb is enabled",
        predicate: |ctx, _| ctx.autonomy.do_not_disturb,
        outcome: RuleOutcome::Silence,
    },
    Rule {
        name: "ignore_threshold",
        reason: "Recent suggestions were ignored; respecting autonomy",
        predicate: |ctx, policy| ctx.autonomy.ignore_count >= policy.ignore_threshold,
        outcome: RuleOutcome::Silence,
    },
    Rule {
        name: "critical_fatigue",
        reason: "Fatigue is critical",
        predicate: |ctx, _| ctx.snapshot.fatigue_level == FatigueLevel::Critical,
        outcome: RuleOutcome::ForceBreak,
    },
    Rule {
        name: "deep_focus",
        reason: "Learner is in deep focus",
        predicate: |ctx, policy| {
            policy.deep_focus_window > 0 && ctx.focus_streak >= policy.deep_focus_window
        },
        outcome: RuleOutcome::Silence,
    },
    Rule {
        name: "high_fatigue",
        reason: "Fatigue is high",
        predicate: |ctx, _| ctx.snapshot.fatigue_level == FatigueLevel::High,
        outcome: RuleOutcome::SuggestBreak,
    },
];

/// First rule whose predicate holds, or `None` when the advisory source must decide
#[must_use]
pub fn select_rule(ctx: &DecisionContext, policy: &DecisionPolicy) -> Option<&'static Rule> {
    RULES.iter().find(|rule| (rule.predicate)(ctx, policy))
}
