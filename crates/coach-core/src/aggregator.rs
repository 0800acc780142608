//! Signal aggregation: raw provider outputs to canonical snapshots.

use chrono::{DateTime, Utc};
use coach_ai::Trend;
use coach_storage::models::{FatigueLevel, FocusState, SignalSnapshot, SignalSource};
use uuid::Uuid;

use crate::config::CoachConfig;
use crate::sensors::{RawReadings, SensorReading};

/// Neutral focus used when the focus model is unavailable
pub const NEUTRAL_FOCUS: (FocusState, f32) = (FocusState::Drifting, 0.5);
/// Neutral fatigue used when the fatigue model is unavailable
pub const NEUTRAL_FATIGUE: (FatigueLevel, f32) = (FatigueLevel::Alert, 0.0);

const TREND_EPSILON: f32 = 0.05;

/// Append-only, time-ordered snapshots of one session
#[derive(Debug, Clone, Default)]
pub struct SignalHistory {
    snapshots: Vec<SignalSnapshot>,
}

impl SignalHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a history from persisted snapshots
    #[must_use]
    pub fn from_snapshots(snapshots: Vec<SignalSnapshot>) -> Self {
        Self { snapshots }
    }

    #[must_use]
    pub fn snapshots(&self) -> &[SignalSnapshot] {
        &self.snapshots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Most recently appended snapshot
    #[must_use]
    pub fn latest(&self) -> Option<&SignalSnapshot> {
        self.snapshots.last()
    }

    /// Length of the trailing run of Focused snapshots
    #[must_use]
    pub fn focused_streak(&self) -> u32 {
        let run = self
            .snapshots
            .iter()
            .rev()
            .take_while(|s| s.focus_state == FocusState::Focused)
            .count();
        u32::try_from(run).unwrap_or(u32::MAX)
    }

    /// Whether the last `window` snapshots are all Focused
    #[must_use]
    pub fn is_deep_focus(&self, window: u32) -> bool {
        window > 0 && self.focused_streak() >= window
    }

    /// Compare mean fatigue of the older and newer halves of the last `window` snapshots
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fatigue_trend(&self, window: usize) -> Trend {
        let start = self.snapshots.len().saturating_sub(window);
        let recent = &self.snapshots[start..];
        if recent.len() < 2 {
            return Trend::Steady;
        }

        let (older, newer) = recent.split_at(recent.len() / 2);
        let mean = |part: &[SignalSnapshot]| {
            part.iter().map(|s| s.fatigue_score).sum::<f32>() / part.len() as f32
        };

        let delta = mean(newer) - mean(older);
        if delta > TREND_EPSILON {
            Trend::Rising
        } else if delta < -TREND_EPSILON {
            Trend::Falling
        } else {
            Trend::Steady
        }
    }

    fn last_measured<T>(
        &self,
        pick: impl Fn(&SignalSnapshot) -> (T, f32, SignalSource),
    ) -> Option<(T, f32, DateTime<Utc>)> {
        self.snapshots.iter().rev().find_map(|s| {
            let (state, score, source) = pick(s);
            (source == SignalSource::Measured).then_some((state, score, s.timestamp))
        })
    }

    fn append(&mut self, snapshot: SignalSnapshot) {
        self.snapshots.push(snapshot);
    }
}

/// Resolved value for one signal
#[derive(Debug, Clone, Copy, PartialEq)]
struct Resolved<T> {
    state: T,
    score: f32,
    source: SignalSource,
}

/// Turns raw readings into snapshots.
///
/// Unavailable readings fall back to the neutral defaults. Low-confidence
/// readings are replaced by the latest measured value if it is recent enough.
#[derive(Debug, Clone)]
pub struct Aggregator {
    min_confidence: f32,
    carry_forward: chrono::Duration,
}

impl Aggregator {
    #[must_use]
    pub fn new(config: &CoachConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            carry_forward: config.carry_forward(),
        }
    }

    /// Build a snapshot from `raw` and append it to `history`
    pub fn observe(
        &self,
        history: &mut SignalHistory,
        user_id: &str,
        session_id: Uuid,
        raw: RawReadings,
        now: DateTime<Utc>,
    ) -> SignalSnapshot {
        let focus = self.resolve(
            "focus",
            raw.focus,
            history.last_measured(|s| (s.focus_state, s.focus_score, s.focus_source)),
            NEUTRAL_FOCUS,
            now,
        );
        let fatigue = self.resolve(
            "fatigue",
            raw.fatigue,
            history.last_measured(|s| (s.fatigue_level, s.fatigue_score, s.fatigue_source)),
            NEUTRAL_FATIGUE,
            now,
        );

        let snapshot = SignalSnapshot {
            user_id: user_id.to_string(),
            session_id,
            timestamp: now,
            focus_state: focus.state,
            focus_score: focus.score,
            focus_source: focus.source,
            fatigue_level: fatigue.state,
            fatigue_score: fatigue.score,
            fatigue_source: fatigue.source,
        };
        log::debug!(
            "Session {session_id}: snapshot {} ({:?}) / {} ({:?})",
            snapshot.focus_state,
            snapshot.focus_source,
            snapshot.fatigue_level,
            snapshot.fatigue_source
        );
        history.append(snapshot.clone());
        snapshot
    }

    fn resolve<T: Copy + std::fmt::Display>(
        &self,
        signal: &str,
        reading: SensorReading<T>,
        last_measured: Option<(T, f32, DateTime<Utc>)>,
        neutral: (T, f32),
        now: DateTime<Utc>,
    ) -> Resolved<T> {
        match reading {
            SensorReading::Unavailable => {
                log::warn!(
                    "{signal} provider unavailable, using neutral default {}",
                    neutral.0
                );
                Resolved {
                    state: neutral.0,
                    score: neutral.1,
                    source: SignalSource::NeutralDefault,
                }
            }
            SensorReading::Available {
                state,
                score,
                confidence,
            } => {
                if confidence >= self.min_confidence {
                    return Resolved {
                        state,
                        score: score.clamp(0.0, 1.0),
                        source: SignalSource::Measured,
                    };
                }
                match last_measured {
                    Some((prev_state, prev_score, at)) if now - at <= self.carry_forward => {
                        log::debug!(
                            "{signal} confidence {confidence:.2} below threshold, carrying forward {prev_state}"
                        );
                        Resolved {
                            state: prev_state,
                            score: prev_score,
                            source: SignalSource::CarriedForward,
                        }
                    }
                    _ => {
                        log::debug!(
                            "{signal} confidence {confidence:.2} below threshold, no recent reading to carry forward"
                        );
                        Resolved {
                            state,
                            score: score.clamp(0.0, 1.0),
                            source: SignalSource::Measured,
                        }
                    }
                }
            }
        }
    }
}
