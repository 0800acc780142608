//! Focus and fatigue providers consumed by the signal aggregator.

use std::collections::VecDeque;

use async_trait::async_trait;
use coach_storage::models::{FatigueLevel, FocusState};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

/// One raw output of a signal model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SensorReading<T> {
    Available {
        state: T,
        /// Model score in 0.0..=1.0
        score: f32,
        /// Model confidence in 0.0..=1.0
        confidence: f32,
    },
    Unavailable,
}

impl<T> SensorReading<T> {
    /// A fully confident reading
    #[must_use]
    pub const fn measured(state: T, score: f32) -> Self {
        Self::Available {
            state,
            score,
            confidence: 1.0,
        }
    }
}

/// Focus model adapter
#[async_trait]
pub trait FocusProvider: Send + Sync {
    async fn read_focus(&self, user_id: &str, session_id: Uuid) -> SensorReading<FocusState>;
}

/// Fatigue model adapter
#[async_trait]
pub trait FatigueProvider: Send + Sync {
    async fn read_fatigue(&self, user_id: &str, session_id: Uuid)
        -> SensorReading<FatigueLevel>;
}

/// Both readings taken for one sampling tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReadings {
    pub focus: SensorReading<FocusState>,
    pub fatigue: SensorReading<FatigueLevel>,
}

impl RawReadings {
    /// Read both providers for a session
    pub async fn collect(
        focus: &dyn FocusProvider,
        fatigue: &dyn FatigueProvider,
        user_id: &str,
        session_id: Uuid,
    ) -> Self {
        Self {
            focus: focus.read_focus(user_id, session_id).await,
            fatigue: fatigue.read_fatigue(user_id, session_id).await,
        }
    }
}

/// Replays queued readings in order; an empty queue reads as unavailable.
///
/// Drives simulations and tests in place of real focus and fatigue models.
#[derive(Debug, Default)]
pub struct ScriptedSensors {
    focus: Mutex<VecDeque<SensorReading<FocusState>>>,
    fatigue: Mutex<VecDeque<SensorReading<FatigueLevel>>>,
}

impl ScriptedSensors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the readings for the next sampling tick
    pub async fn push(
        &self,
        focus: SensorReading<FocusState>,
        fatigue: SensorReading<FatigueLevel>,
    ) {
        self.focus.lock().await.push_back(focus);
        self.fatigue.lock().await.push_back(fatigue);
    }

    pub async fn remaining(&self) -> usize {
        self.focus.lock().await.len()
    }
}

#[async_trait]
impl FocusProvider for ScriptedSensors {
    async fn read_focus(&self, _user_id: &str, _session_id: Uuid) -> SensorReading<FocusState> {
        self.focus
            .lock()
            .await
            .pop_front()
            .unwrap_or(SensorReading::Unavailable)
    }
}

#[async_trait]
impl FatigueProvider for ScriptedSensors {
    async fn read_fatigue(
        &self,
        _user_id: &str,
        _session_id: Uuid,
    ) -> SensorReading<FatigueLevel> {
        self.fatigue
            .lock()
            .await
            .pop_front()
            .unwrap_or(SensorReading::Unavailable)
    }
}
