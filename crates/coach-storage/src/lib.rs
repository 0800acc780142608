pub mod db;
pub mod migrations;
pub mod models;
pub mod store;

pub use db::Database;
pub use models::{
    AiConfig, AiProvider, AutonomyState, CoachAction, CoachActionKind, DecisionRecord,
    FatigueLevel, FocusState, ResponseOutcome, ScheduleEvent, ScheduleEventKind,
    ScheduleEventPayload, SessionState, SignalSnapshot, SignalSource, StudySession, Task,
    TaskKind, TaskShift, TaskStatus,
};
pub use store::SessionStore;
