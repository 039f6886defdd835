//! Events (chapter meetings) and their attendee rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chapterhub_core::{AttendeeId, ChapterId, DomainError, Entity, EventId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Meeting,
    Social,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceType {
    Weekly,
}

/// Recurrence metadata; occurrences are not expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub kind: RecurrenceType,
    /// Free-form pattern, e.g. `"every Tuesday"`.
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub venue: Option<String>,
    pub date: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
    /// Whole currency units; 0 means free.
    pub entry_fee: u32,
    pub is_public: bool,
    /// Nulled when the owning chapter is deleted.
    pub chapter_id: Option<ChapterId>,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Upcoming means dated at or after `now`; earlier events are history.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.date >= now
    }

    pub fn is_free(&self) -> bool {
        self.entry_fee == 0
    }
}

pub fn validate_title(title: &str) -> Result<String, DomainError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("meeting title is required"));
    }
    if title.chars().count() > 200 {
        return Err(DomainError::validation("meeting title is too long"));
    }
    Ok(title.to_string())
}

impl Entity for Event {
    type Id = EventId;

    fn id(&self) -> EventId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendeeStatus {
    Invited,
    Going,
    NotGoing,
    Attended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

/// One user's place on one event. `(event_id, user_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttendee {
    pub id: AttendeeId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub status: AttendeeStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub amount_paid: u32,
    pub created_at: DateTime<Utc>,
}

impl EventAttendee {
    /// `INVITED` / `PENDING`, as created when a member joins or a meeting is
    /// scheduled.
    pub fn invite(event_id: EventId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: AttendeeId::new(),
            event_id,
            user_id,
            status: AttendeeStatus::Invited,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            amount_paid: 0,
            created_at: now,
        }
    }

    pub fn mark_paid(&mut self, payment_id: impl Into<String>, amount: u32) {
        self.status = AttendeeStatus::Going;
        self.payment_status = PaymentStatus::Paid;
        self.payment_id = Some(payment_id.into());
        self.amount_paid = amount;
    }
}

impl Entity for EventAttendee {
    type Id = AttendeeId;

    fn id(&self) -> AttendeeId {
        self.id
    }
}
