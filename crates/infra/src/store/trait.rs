use std::sync::Arc;

use thiserror::Error;

use chapterhub_auth::User;
use chapterhub_chapters::{
    AuditEntry, Chapter, ChapterMember, City, Event, EventAttendee, JoinRequest, State,
};
use chapterhub_core::{
    AttendeeId, ChapterId, CityId, EventId, JoinRequestId, MembershipId, StateId, UserId,
};

use super::query::{ChapterScan, UserScan, Window};

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors; callers
/// map them onto the domain taxonomy (a unique violation is a conflict).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("row not found: {0}")]
    MissingRow(String),

    #[error("audit write failed: {0}")]
    AuditWrite(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Read half of the relational store.
///
/// Lookups return `None` for missing rows; list methods return rows in a
/// stable order documented per method.
pub trait StoreRead {
    fn state(&self, id: StateId) -> Option<State>;
    fn state_by_code(&self, code: &str) -> Option<State>;
    /// Ordered by name.
    fn states(&self) -> Vec<State>;
    fn city(&self, id: CityId) -> Option<City>;
    /// Ordered by name.
    fn cities_in(&self, state_id: StateId) -> Vec<City>;

    fn user(&self, id: UserId) -> Option<User>;
    fn user_by_email(&self, email: &str) -> Option<User>;
    /// Newest first, then windowed.
    fn users(&self, scan: &UserScan) -> Vec<User>;
    /// Count ignoring the window.
    fn count_users(&self, scan: &UserScan) -> usize;

    fn chapter(&self, id: ChapterId) -> Option<Chapter>;
    fn chapter_by_name(&self, name: &str, city_id: CityId) -> Option<Chapter>;
    /// Newest first, then windowed.
    fn chapters(&self, scan: &ChapterScan) -> Vec<Chapter>;
    fn count_chapters(&self, scan: &ChapterScan) -> usize;
    /// Oldest `ACTIVE` chapter at exactly this state and city.
    fn oldest_active_chapter(&self, state_id: StateId, city_id: CityId) -> Option<Chapter>;

    fn membership(&self, chapter_id: ChapterId, user_id: UserId) -> Option<ChapterMember>;
    fn membership_by_id(&self, id: MembershipId) -> Option<ChapterMember>;
    /// Newest joiners first.
    fn chapter_members(&self, chapter_id: ChapterId) -> Vec<ChapterMember>;
    fn user_memberships(&self, user_id: UserId) -> Vec<ChapterMember>;

    fn join_request(&self, id: JoinRequestId) -> Option<JoinRequest>;
    fn pending_join_request(&self, chapter_id: ChapterId, user_id: UserId)
    -> Option<JoinRequest>;
    /// Pending requests of a chapter, newest first.
    fn pending_join_requests(&self, chapter_id: ChapterId) -> Vec<JoinRequest>;

    fn event(&self, id: EventId) -> Option<Event>;
    /// Newest (by date) first.
    fn chapter_events(&self, chapter_id: ChapterId) -> Vec<Event>;

    fn attendee(&self, id: AttendeeId) -> Option<EventAttendee>;
    fn attendee_for(&self, event_id: EventId, user_id: UserId) -> Option<EventAttendee>;
    fn event_attendees(&self, event_id: EventId) -> Vec<EventAttendee>;

    /// Newest first, then windowed.
    fn audit_entries(&self, window: Window) -> Vec<AuditEntry>;
    fn count_audit_entries(&self) -> usize;
}

/// Write half, available only inside [`Store::transaction`].
///
/// Referential behaviour follows the relational model: deleting a chapter
/// cascades its memberships and join requests and nulls the chapter pointer
/// on users and events; deleting an event cascades its attendees.
pub trait Transaction: StoreRead {
    fn insert_state(&mut self, state: State) -> Result<(), StoreError>;
    fn insert_city(&mut self, city: City) -> Result<(), StoreError>;

    /// Unique on email.
    fn insert_user(&mut self, user: User) -> Result<(), StoreError>;
    fn update_user(&mut self, user: User) -> Result<(), StoreError>;

    /// Unique on (name, city).
    fn insert_chapter(&mut self, chapter: Chapter) -> Result<(), StoreError>;
    fn update_chapter(&mut self, chapter: Chapter) -> Result<(), StoreError>;
    fn delete_chapter(&mut self, id: ChapterId) -> Result<(), StoreError>;

    /// Unique on (chapter, user).
    fn insert_membership(&mut self, member: ChapterMember) -> Result<(), StoreError>;
    fn update_membership(&mut self, member: ChapterMember) -> Result<(), StoreError>;
    fn delete_membership(&mut self, id: MembershipId) -> Result<(), StoreError>;

    fn insert_join_request(&mut self, request: JoinRequest) -> Result<(), StoreError>;
    fn update_join_request(&mut self, request: JoinRequest) -> Result<(), StoreError>;

    fn insert_event(&mut self, event: Event) -> Result<(), StoreError>;
    fn delete_event(&mut self, id: EventId) -> Result<(), StoreError>;

    /// Unique on (event, user).
    fn insert_attendee(&mut self, attendee: EventAttendee) -> Result<(), StoreError>;
    fn update_attendee(&mut self, attendee: EventAttendee) -> Result<(), StoreError>;
    fn delete_attendee(&mut self, id: AttendeeId) -> Result<(), StoreError>;

    /// Append-only. A failure here must abort the enclosing transaction.
    fn append_audit(&mut self, entry: AuditEntry) -> Result<(), StoreError>;
}

/// Transactional relational store.
///
/// `transaction` runs the closure against an isolated write view: if it
/// returns `Ok` every write commits together, otherwise nothing does.
/// Implementations serialize conflicting transactions, so a read-then-write
/// inside one closure cannot race another transaction.
pub trait Store: Send + Sync {
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, E>,
        E: From<StoreError>;

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
        E: From<StoreError>;
}

impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).read(f)
    }

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).transaction(f)
    }
}
