//! Advisory coaching for ambiguous learner states.
//!
//! The decision engine only consults an [`Advisor`] after every deterministic
//! rule has declined. The advisor's answer is a restricted verdict: it can stay
//! silent or suggest, never force a break.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use coach_storage::models::{AiConfig, AutonomyState, CoachAction, SignalSnapshot, TaskKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ai_provider::{create_provider, AiProviderTrait};
use crate::prompt::{build_user_prompt, SYSTEM_PROMPT};

/// Longest break an advisory suggestion may carry
pub const MAX_SUGGESTED_BREAK_MINUTES: u32 = 60;

/// Direction of a signal over the recent window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Steady,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Steady => "steady",
        })
    }
}

/// Schedule slot as shown to the advisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    pub title: String,
    pub kind: TaskKind,
    pub duration_minutes: u32,
    pub start_offset_minutes: u32,
}

/// Everything the advisor sees about the learner at decision time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub snapshot: SignalSnapshot,
    pub autonomy: AutonomyState,
    pub fatigue_trend: Trend,
    /// Trailing run of Focused snapshots
    pub focus_streak: u32,
    pub minutes_into_session: u32,
    pub current_task: Option<TaskContext>,
    pub upcoming_tasks: Vec<TaskContext>,
}

/// Restricted advisory outcome. There is no forced-break variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryVerdict {
    Silence {
        reason: String,
    },
    Suggest {
        reason: String,
        message: Option<String>,
        duration_minutes: Option<u32>,
    },
}

impl AdvisoryVerdict {
    /// Convert into the engine's action type
    #[must_use]
    pub fn into_action(self) -> CoachAction {
        match self {
            Self::Silence { reason } => CoachAction::silence(reason),
            Self::Suggest {
                reason,
                message,
                duration_minutes,
            } => CoachAction::suggest(reason, message, duration_minutes),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("advisory provider failed: {0:#}")]
    Provider(anyhow::Error),
    #[error("advisory call timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed advisory reply: {0}")]
    Malformed(String),
    #[error("advisory coaching is disabled")]
    Disabled,
}

/// Source of advisory verdicts
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Produce a verdict for an ambiguous state
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or its reply cannot be understood
    async fn advise(&self, request: &AdvisoryRequest) -> Result<AdvisoryVerdict, AdvisoryError>;
}

/// Advisor that never speaks; used when no text-generation backend is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAdvisor;

#[async_trait]
impl Advisor for DisabledAdvisor {
    async fn advise(&self, _request: &AdvisoryRequest) -> Result<AdvisoryVerdict, AdvisoryError> {
        Err(AdvisoryError::Disabled)
    }
}

/// Advisor backed by a text-generation provider
pub struct LlmAdvisor {
    provider: Box<dyn AiProviderTrait>,
    parser: ReplyParser,
}

impl LlmAdvisor {
    /// Wrap an existing provider
    ///
    /// # Errors
    ///
    /// Returns an error if the reply parser cannot be built
    pub fn new(provider: Box<dyn AiProviderTrait>) -> anyhow::Result<Self> {
        Ok(Self {
            provider,
            parser: ReplyParser::new()?,
        })
    }

    /// Build an advisor from stored AI configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be created
    pub fn from_config(config: &AiConfig) -> anyhow::Result<Self> {
        let provider = create_provider(config)?;
        log::info!("Advisory coaching uses model {}", provider.model_name());
        Self::new(provider)
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Whether the backend answers at all
    pub async fn is_reachable(&self) -> bool {
        self.provider.is_available().await
    }
}

#[async_trait]
impl Advisor for LlmAdvisor {
    async fn advise(&self, request: &AdvisoryRequest) -> Result<AdvisoryVerdict, AdvisoryError> {
        let prompt = build_user_prompt(request);
        let reply = self
            .provider
            .generate(SYSTEM_PROMPT, &prompt)
            .await
            .map_err(AdvisoryError::Provider)?;
        log::debug!("Advisory reply: {reply}");
        self.parser.parse(&reply)
    }
}

#[derive(Debug, Deserialize)]
struct RawReply {
    action_type: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    schedule_changes: Option<RawScheduleChange>,
}

#[derive(Debug, Deserialize)]
struct RawScheduleChange {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    duration_minutes: Option<i64>,
}

impl RawScheduleChange {
    /// Break length, if this change asks for a break at all
    fn break_minutes(self) -> Option<u32> {
        match self.action.as_deref().map(str::trim) {
            None | Some("add_break") => self.duration_minutes.map(clamp_break_minutes),
            Some(other) => {
                log::debug!("Ignoring advisory schedule change {other}, only breaks are applied");
                None
            }
        }
    }
}

/// Turns model output into a verdict.
///
/// Models often wrap JSON in prose or code fences, so the outermost object is
/// extracted before decoding.
pub struct ReplyParser {
    object_pattern: Regex,
}

impl ReplyParser {
    /// # Errors
    ///
    /// Returns an error if the extraction pattern fails to compile
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            object_pattern: Regex::new(r"(?s)\{.*\}")?,
        })
    }

    /// Parse one reply
    ///
    /// # Errors
    ///
    /// Returns [`AdvisoryError::Malformed`] if no JSON object is present, it does
    /// not decode, or the action type is unknown
    pub fn parse(&self, reply: &str) -> Result<AdvisoryVerdict, AdvisoryError> {
        let body = self
            .object_pattern
            .find(reply)
            .map(|m| m.as_str())
            .ok_or_else(|| AdvisoryError::Malformed("no JSON object in reply".to_string()))?;

        let raw: RawReply =
            serde_json::from_str(body).map_err(|e| AdvisoryError::Malformed(e.to_string()))?;

        let reason = raw
            .reasoning
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| format!("advisory {}", raw.action_type));
        let message = raw.message.filter(|m| !m.trim().is_empty());

        match raw.action_type.trim().to_lowercase().as_str() {
            "silence" => Ok(AdvisoryVerdict::Silence { reason }),
            "suggest_break" => Ok(AdvisoryVerdict::Suggest {
                reason,
                message,
                duration_minutes: raw
                    .schedule_changes
                    .and_then(RawScheduleChange::break_minutes),
            }),
            "nudge" | "encourage" | "renegotiate_task" => Ok(AdvisoryVerdict::Suggest {
                reason,
                message,
                duration_minutes: None,
            }),
            other => Err(AdvisoryError::Malformed(format!(
                "unknown action_type: {other}"
            ))),
        }
    }
}

fn clamp_break_minutes(minutes: i64) -> u32 {
    let clamped = minutes.clamp(1, i64::from(MAX_SUGGESTED_BREAK_MINUTES));
    u32::try_from(clamped).unwrap_or(MAX_SUGGESTED_BREAK_MINUTES)
}
