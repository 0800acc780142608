pub mod aggregator;
pub mod autonomy;
pub mod config;
pub mod daemon;
pub mod decision;
pub mod error;
pub mod schedule;
pub mod sensors;
pub mod session;

pub use aggregator::{Aggregator, SignalHistory};
pub use config::CoachConfig;
pub use daemon::Daemon;
pub use decision::{Decision, DecisionContext, DecisionEngine};
pub use error::{CoreError, Result};
pub use schedule::{PlannedTask, Schedule, ScheduleHistory};
pub use sensors::{FatigueProvider, FocusProvider, RawReadings, ScriptedSensors, SensorReading};
pub use session::{SessionController, SessionHandle};
