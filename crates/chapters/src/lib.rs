//! Chapters domain module.
//!
//! Records for the location hierarchy, chapters, memberships, join requests,
//! meetings and the audit log, together with their pure state transitions
//! (no IO, no storage).

pub mod audit;
pub mod chapter;
pub mod geo;
pub mod join_request;
pub mod meeting;
pub mod member;

pub use audit::{AuditAction, AuditEntry};
pub use chapter::{Chapter, ChapterStatus, validate_name};
pub use geo::{City, State};
pub use join_request::{JoinDecision, JoinRequest, JoinRequestStatus};
pub use meeting::{
    AttendeeStatus, Event, EventAttendee, EventType, PaymentStatus, Recurrence, RecurrenceType,
    validate_title,
};
pub use member::ChapterMember;
