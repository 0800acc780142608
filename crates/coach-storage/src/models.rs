use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Implements `as_str`, `Display` and `FromStr` for fieldless enums stored as TEXT.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($name))),
                }
            }
        }
    };
}

// ==================== Signals ====================

/// Attention classification produced by the focus model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusState {
    Focused,
    Drifting,
    Lost,
}

text_enum!(FocusState {
    Focused => "Focused",
    Drifting => "Drifting",
    Lost => "Lost",
});

/// Tiredness classification produced by the fatigue model, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FatigueLevel {
    Alert,
    Moderate,
    High,
    Critical,
}

text_enum!(FatigueLevel {
    Alert => "Alert",
    Moderate => "Moderate",
    High => "High",
    Critical => "Critical",
});

/// Where a snapshot's value for one signal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalSource {
    /// Fresh reading from the provider above the confidence threshold
    Measured,
    /// Copied from a recent reliable snapshot because the fresh reading was low-confidence
    CarriedForward,
    /// Provider was unavailable; neutral default substituted
    NeutralDefault,
}

text_enum!(SignalSource {
    Measured => "Measured",
    CarriedForward => "CarriedForward",
    NeutralDefault => "NeutralDefault",
});

/// One timestamped observation of a learner's focus and fatigue.
///
/// Snapshots are immutable once created and only ever appended to a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub user_id: String,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub focus_state: FocusState,
    /// 1.0 = fully focused, 0.0 = lost
    pub focus_score: f32,
    pub focus_source: SignalSource,
    pub fatigue_level: FatigueLevel,
    /// 0.0 = alert, 1.0 = critically fatigued
    pub fatigue_score: f32,
    pub fatigue_source: SignalSource,
}

// ==================== Autonomy ====================

/// Per-session record of how the learner has responded to coaching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonomyState {
    pub user_id: String,
    pub session_id: Uuid,
    pub ignore_count: u32,
    pub do_not_disturb: bool,
}

impl AutonomyState {
    #[must_use]
    pub fn new(user_id: &str, session_id: Uuid) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_id,
            ignore_count: 0,
            do_not_disturb: false,
        }
    }
}

/// Learner response to a coaching action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseOutcome {
    Accepted,
    Ignored,
    BreakCompleted,
}

text_enum!(ResponseOutcome {
    Accepted => "Accepted",
    Ignored => "Ignored",
    BreakCompleted => "BreakCompleted",
});

// ==================== Coaching ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoachActionKind {
    Silence,
    Suggest,
    ForceBreak,
}

text_enum!(CoachActionKind {
    Silence => "Silence",
    Suggest => "Suggest",
    ForceBreak => "ForceBreak",
});

/// The single output of a coaching decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachAction {
    pub kind: CoachActionKind,
    pub reason: String,
    pub message: Option<String>,
    pub suggested_duration_minutes: Option<u32>,
}

impl CoachAction {
    #[must_use]
    pub fn silence(reason: impl Into<String>) -> Self {
        Self {
            kind: CoachActionKind::Silence,
            reason: reason.into(),
            message: None,
            suggested_duration_minutes: None,
        }
    }

    #[must_use]
    pub fn suggest(
        reason: impl Into<String>,
        message: Option<String>,
        duration_minutes: Option<u32>,
    ) -> Self {
        Self {
            kind: CoachActionKind::Suggest,
            reason: reason.into(),
            message,
            suggested_duration_minutes: duration_minutes,
        }
    }

    #[must_use]
    pub fn force_break(reason: impl Into<String>, message: String, duration_minutes: u32) -> Self {
        Self {
            kind: CoachActionKind::ForceBreak,
            reason: reason.into(),
            message: Some(message),
            suggested_duration_minutes: Some(duration_minutes),
        }
    }
}

/// Persisted entry of the decision log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub session_id: Uuid,
    pub decided_at: DateTime<Utc>,
    /// Name of the rule that produced the action
    pub rule: String,
    pub action: CoachAction,
}

// ==================== Schedule ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Active,
    Completed,
    Skipped,
}

text_enum!(TaskStatus {
    Pending => "Pending",
    Active => "Active",
    Completed => "Completed",
    Skipped => "Skipped",
});

impl TaskStatus {
    /// Completed and Skipped tasks no longer need time
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    Study,
    Break,
}

text_enum!(TaskKind {
    Study => "Study",
    Break => "Break",
});

/// A slot on a session's timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub session_id: Uuid,
    pub order: u32,
    pub title: String,
    pub start_offset_minutes: u32,
    pub duration_minutes: u32,
    pub status: TaskStatus,
    pub kind: TaskKind,
}

impl Task {
    #[must_use]
    pub const fn end_offset_minutes(&self) -> u32 {
        self.start_offset_minutes + self.duration_minutes
    }
}

/// Offset change applied to one task by a schedule mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskShift {
    pub task_id: Uuid,
    pub from_offset_minutes: u32,
    pub to_offset_minutes: u32,
    /// Negative when the task moved earlier
    pub delta_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEventKind {
    BreakInserted,
    TasksShifted,
    TaskCompleted,
    TaskExtended,
    TaskSkipped,
    TaskMoved,
}

text_enum!(ScheduleEventKind {
    BreakInserted => "BreakInserted",
    TasksShifted => "TasksShifted",
    TaskCompleted => "TaskCompleted",
    TaskExtended => "TaskExtended",
    TaskSkipped => "TaskSkipped",
    TaskMoved => "TaskMoved",
});

/// Event body; carries enough to reconstruct the mutation from the log alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ScheduleEventPayload {
    BreakInserted {
        break_task_id: Uuid,
        /// Task the break was placed in front of
        before_task_id: Uuid,
        position: u32,
        start_offset_minutes: u32,
        duration_minutes: u32,
    },
    TasksShifted {
        shifts: Vec<TaskShift>,
    },
    TaskCompleted {
        task_id: Uuid,
        task_kind: TaskKind,
    },
    TaskExtended {
        task_id: Uuid,
        added_minutes: u32,
    },
    TaskSkipped {
        task_id: Uuid,
    },
    TaskMoved {
        task_id: Uuid,
        from_position: u32,
        to_position: u32,
    },
}

impl ScheduleEventPayload {
    #[must_use]
    pub const fn kind(&self) -> ScheduleEventKind {
        match self {
            Self::BreakInserted { .. } => ScheduleEventKind::BreakInserted,
            Self::TasksShifted { .. } => ScheduleEventKind::TasksShifted,
            Self::TaskCompleted { .. } => ScheduleEventKind::TaskCompleted,
            Self::TaskExtended { .. } => ScheduleEventKind::TaskExtended,
            Self::TaskSkipped { .. } => ScheduleEventKind::TaskSkipped,
            Self::TaskMoved { .. } => ScheduleEventKind::TaskMoved,
        }
    }
}

/// Write-once entry of a session's schedule audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub session_id: Uuid,
    /// Position in the session's history, starting at 0
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: ScheduleEventPayload,
}

impl ScheduleEvent {
    #[must_use]
    pub const fn kind(&self) -> ScheduleEventKind {
        self.payload.kind()
    }
}

// ==================== Sessions ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Active,
    Paused,
    Completed,
}

text_enum!(SessionState {
    Idle => "Idle",
    Active => "Active",
    Paused => "Paused",
    Completed => "Completed",
});

/// A learner's study session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySession {
    pub session_id: Uuid,
    pub user_id: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_decision_at: Option<DateTime<Utc>>,
}

impl StudySession {
    #[must_use]
    pub fn new(user_id: &str) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            state: SessionState::Idle,
            created_at: Utc::now(),
            started_at: None,
            last_decision_at: None,
        }
    }
}

// ==================== AI configuration ====================

/// Text-generation backend used for advisory decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Ollama,
    OpenAi,
}

impl AiProvider {
    /// Parse a provider name, accepting common spellings
    #[must_use]
    pub fn parse_provider(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "open_ai" | "open-ai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    #[must_use]
    pub const fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => "llama3.2",
            Self::OpenAi => "gpt-4o-mini",
        }
    }

    #[must_use]
    pub const fn default_base_url(&self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Environment variable consulted when no API key is configured
    #[must_use]
    pub const fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Ollama => None,
            Self::OpenAi => Some("OPENAI_API_KEY"),
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::OpenAi => f.write_str("openai"),
        }
    }
}

/// Advisory source configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub enabled: bool,
}

impl AiConfig {
    #[must_use]
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Configured key, or the provider's environment variable
    #[must_use]
    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.provider
                .api_key_env()
                .and_then(|var| std::env::var(var).ok())
        })
    }
}
