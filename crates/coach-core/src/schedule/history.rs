use chrono::{DateTime, Utc};
use coach_storage::models::{ScheduleEvent, ScheduleEventPayload};
use uuid::Uuid;

/// Write-once audit trail of one session's schedule mutations.
///
/// Entries can only be appended; readers always see a prefix of the final log.
/// The log also remembers how much of itself has reached durable storage, so a
/// failed write is retried rather than lost.
#[derive(Debug, Clone)]
pub struct ScheduleHistory {
    session_id: Uuid,
    events: Vec<ScheduleEvent>,
    persisted: usize,
}

impl ScheduleHistory {
    #[must_use]
    pub const fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            events: Vec::new(),
            persisted: 0,
        }
    }

    /// Rebuild from persisted events, which must already be in sequence order
    #[must_use]
    pub fn from_events(session_id: Uuid, events: Vec<ScheduleEvent>) -> Self {
        Self {
            session_id,
            persisted: events.len(),
            events,
        }
    }

    #[must_use]
    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events appended after the first `from` entries
    #[must_use]
    pub fn since(&self, from: usize) -> &[ScheduleEvent] {
        self.events.get(from..).unwrap_or_default()
    }

    /// Events not yet confirmed as stored, oldest first
    #[must_use]
    pub fn unpersisted(&self) -> &[ScheduleEvent] {
        self.since(self.persisted)
    }

    /// Record that the oldest unpersisted event has been stored
    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = (self.persisted + 1).min(self.events.len());
    }

    pub(crate) fn append(&mut self, payload: ScheduleEventPayload, now: DateTime<Utc>) {
        let sequence = self.events.len() as u64;
        log::debug!(
            "Session {}: history #{sequence} {}",
            self.session_id,
            payload.kind()
        );
        self.events.push(ScheduleEvent {
            session_id: self.session_id,
            sequence,
            timestamp: now,
            payload,
        });
    }
}
