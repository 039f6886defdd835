use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chapterhub_auth::User;
use chapterhub_chapters::{
    AuditEntry, Chapter, ChapterMember, City, Event, EventAttendee, JoinRequest, State,
};
use chapterhub_core::{
    AttendeeId, ChapterId, CityId, Entity, EventId, JoinRequestId, MembershipId, StateId, UserId,
};

use super::query::{ChapterScan, UserScan, Window};
use super::r#trait::{Store, StoreError, StoreRead, Transaction};

/// Every table, cloned wholesale to form a transaction's write view.
#[derive(Debug, Clone, Default)]
struct Tables {
    states: HashMap<StateId, State>,
    cities: HashMap<CityId, City>,
    users: HashMap<UserId, User>,
    chapters: HashMap<ChapterId, Chapter>,
    members: HashMap<MembershipId, ChapterMember>,
    join_requests: HashMap<JoinRequestId, JoinRequest>,
    events: HashMap<EventId, Event>,
    attendees: HashMap<AttendeeId, EventAttendee>,
    audit: Vec<AuditEntry>,
    /// Copied from the store's switch when a transaction opens.
    reject_audit: bool,
}

/// In-memory relational store.
///
/// Intended for tests/dev. Not optimized for performance: a transaction holds
/// the write lock for its whole duration and works on a private copy of the
/// tables, swapped in only on success.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    reject_audit: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent audit append fail (test switch).
    pub fn fail_audit_writes(&self, fail: bool) {
        self.reject_audit.store(fail, Ordering::SeqCst);
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl Store for InMemoryStore {
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, E>,
        E: From<StoreError>,
    {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        f(&*tables)
    }

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut committed = self.tables.write().map_err(|_| poisoned())?;
        let mut working = committed.clone();
        working.reject_audit = self.reject_audit.load(Ordering::SeqCst);

        let out = f(&mut working)?;

        working.reject_audit = false;
        *committed = working;
        Ok(out)
    }
}

fn newest_first<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|r| Reverse(key(r)));
    rows
}

impl Tables {
    fn has_membership(&self, user_id: UserId) -> bool {
        self.members.values().any(|m| m.user_id == user_id)
    }

    fn scan_users(&self, scan: &UserScan) -> Vec<User> {
        let rows = self
            .users
            .values()
            .filter(|u| scan.matches(u))
            .filter(|u| !scan.without_membership || !self.has_membership(u.id))
            .cloned()
            .collect();
        newest_first(rows, |u: &User| (u.created_at, u.id))
    }

    fn scan_chapters(&self, scan: &ChapterScan) -> Vec<Chapter> {
        let rows = self
            .chapters
            .values()
            .filter(|c| scan.matches(c))
            .cloned()
            .collect();
        newest_first(rows, |c: &Chapter| (c.created_at, c.id))
    }
}

impl StoreRead for Tables {
    fn state(&self, id: StateId) -> Option<State> {
        self.states.get(&id).cloned()
    }

    fn state_by_code(&self, code: &str) -> Option<State> {
        self.states.values().find(|s| s.code == code).cloned()
    }

    fn states(&self) -> Vec<State> {
        let mut rows: Vec<State> = self.states.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    fn city(&self, id: CityId) -> Option<City> {
        self.cities.get(&id).cloned()
    }

    fn cities_in(&self, state_id: StateId) -> Vec<City> {
        let mut rows: Vec<City> = self
            .cities
            .values()
            .filter(|c| c.state_id == state_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    fn user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).cloned()
    }

    fn user_by_email(&self, email: &str) -> Option<User> {
        let email = email.trim().to_lowercase();
        self.users.values().find(|u| u.email == email).cloned()
    }

    fn users(&self, scan: &UserScan) -> Vec<User> {
        scan.window.apply(self.scan_users(scan))
    }

    fn count_users(&self, scan: &UserScan) -> usize {
        self.scan_users(scan).len()
    }

    fn chapter(&self, id: ChapterId) -> Option<Chapter> {
        self.chapters.get(&id).cloned()
    }

    fn chapter_by_name(&self, name: &str, city_id: CityId) -> Option<Chapter> {
        self.chapters
            .values()
            .find(|c| c.city_id == city_id && c.name == name)
            .cloned()
    }

    fn chapters(&self, scan: &ChapterScan) -> Vec<Chapter> {
        scan.window.apply(self.scan_chapters(scan))
    }

    fn count_chapters(&self, scan: &ChapterScan) -> usize {
        self.scan_chapters(scan).len()
    }

    fn oldest_active_chapter(&self, state_id: StateId, city_id: CityId) -> Option<Chapter> {
        self.chapters
            .values()
            .filter(|c| c.is_active() && c.state_id == state_id && c.city_id == city_id)
            .min_by_key(|c| (c.created_at, c.id))
            .cloned()
    }

    fn membership(&self, chapter_id: ChapterId, user_id: UserId) -> Option<ChapterMember> {
        self.members
            .values()
            .find(|m| m.chapter_id == chapter_id && m.user_id == user_id)
            .cloned()
    }

    fn membership_by_id(&self, id: MembershipId) -> Option<ChapterMember> {
        self.members.get(&id).cloned()
    }

    fn chapter_members(&self, chapter_id: ChapterId) -> Vec<ChapterMember> {
        let rows = self
            .members
            .values()
            .filter(|m| m.chapter_id == chapter_id)
            .cloned()
            .collect();
        newest_first(rows, |m: &ChapterMember| (m.joined_at, m.id))
    }

    fn user_memberships(&self, user_id: UserId) -> Vec<ChapterMember> {
        let rows = self
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        newest_first(rows, |m: &ChapterMember| (m.joined_at, m.id))
    }

    fn join_request(&self, id: JoinRequestId) -> Option<JoinRequest> {
        self.join_requests.get(&id).cloned()
    }

    fn pending_join_request(
        &self,
        chapter_id: ChapterId,
        user_id: UserId,
    ) -> Option<JoinRequest> {
        self.join_requests
            .values()
            .find(|r| r.chapter_id == chapter_id && r.user_id == user_id && r.is_pending())
            .cloned()
    }

    fn pending_join_requests(&self, chapter_id: ChapterId) -> Vec<JoinRequest> {
        let rows = self
            .join_requests
            .values()
            .filter(|r| r.chapter_id == chapter_id && r.is_pending())
            .cloned()
            .collect();
        newest_first(rows, |r: &JoinRequest| (r.created_at, r.id))
    }

    fn event(&self, id: EventId) -> Option<Event> {
        self.events.get(&id).cloned()
    }

    fn chapter_events(&self, chapter_id: ChapterId) -> Vec<Event> {
        let rows = self
            .events
            .values()
            .filter(|e| e.chapter_id == Some(chapter_id))
            .cloned()
            .collect();
        newest_first(rows, |e: &Event| (e.date, e.id))
    }

    fn attendee(&self, id: AttendeeId) -> Option<EventAttendee> {
        self.attendees.get(&id).cloned()
    }

    fn attendee_for(&self, event_id: EventId, user_id: UserId) -> Option<EventAttendee> {
        self.attendees
            .values()
            .find(|a| a.event_id == event_id && a.user_id == user_id)
            .cloned()
    }

    fn event_attendees(&self, event_id: EventId) -> Vec<EventAttendee> {
        let mut rows: Vec<EventAttendee> = self
            .attendees
            .values()
            .filter(|a| a.event_id == event_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.created_at, a.id));
        rows
    }

    fn audit_entries(&self, window: Window) -> Vec<AuditEntry> {
        // Appended in commit order; newest is last.
        window.apply(self.audit.iter().rev().cloned().collect())
    }

    fn count_audit_entries(&self) -> usize {
        self.audit.len()
    }
}

fn missing(what: &str, id: impl core::fmt::Display) -> StoreError {
    StoreError::MissingRow(format!("{what} {id}"))
}

/// Overwrite an existing row, keyed by its entity id.
fn replace<T>(table: &mut HashMap<T::Id, T>, row: T, what: &str) -> Result<(), StoreError>
where
    T: Entity,
    T::Id: core::fmt::Display,
{
    match table.get_mut(&row.id()) {
        Some(slot) => {
            *slot = row;
            Ok(())
        }
        None => Err(missing(what, row.id())),
    }
}

impl Transaction for Tables {
    fn insert_state(&mut self, state: State) -> Result<(), StoreError> {
        if self.states.values().any(|s| s.code == state.code) {
            return Err(StoreError::UniqueViolation(format!(
                "state code '{}' already exists",
                state.code
            )));
        }
        self.states.insert(state.id, state);
        Ok(())
    }

    fn insert_city(&mut self, city: City) -> Result<(), StoreError> {
        if !self.states.contains_key(&city.state_id) {
            return Err(missing("state", city.state_id));
        }
        self.cities.insert(city.id, city);
        Ok(())
    }

    fn insert_user(&mut self, user: User) -> Result<(), StoreError> {
        if self.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(format!(
                "email '{}' is already registered",
                user.email
            )));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    fn update_user(&mut self, user: User) -> Result<(), StoreError> {
        replace(&mut self.users, user, "user")
    }

    fn insert_chapter(&mut self, chapter: Chapter) -> Result<(), StoreError> {
        if self.chapter_by_name(&chapter.name, chapter.city_id).is_some() {
            return Err(StoreError::UniqueViolation(format!(
                "chapter '{}' already exists in this city",
                chapter.name
            )));
        }
        self.chapters.insert(chapter.id, chapter);
        Ok(())
    }

    fn update_chapter(&mut self, chapter: Chapter) -> Result<(), StoreError> {
        replace(&mut self.chapters, chapter, "chapter")
    }

    fn delete_chapter(&mut self, id: ChapterId) -> Result<(), StoreError> {
        if self.chapters.remove(&id).is_none() {
            return Err(missing("chapter", id));
        }
        self.members.retain(|_, m| m.chapter_id != id);
        self.join_requests.retain(|_, r| r.chapter_id != id);
        for user in self.users.values_mut() {
            if user.chapter_id == Some(id) {
                user.chapter_id = None;
            }
        }
        for event in self.events.values_mut() {
            if event.chapter_id == Some(id) {
                event.chapter_id = None;
            }
        }
        Ok(())
    }

    fn insert_membership(&mut self, member: ChapterMember) -> Result<(), StoreError> {
        if self.membership(member.chapter_id, member.user_id).is_some() {
            return Err(StoreError::UniqueViolation(
                "user is already a member of this chapter".to_string(),
            ));
        }
        self.members.insert(member.id, member);
        Ok(())
    }

    fn update_membership(&mut self, member: ChapterMember) -> Result<(), StoreError> {
        replace(&mut self.members, member, "membership")
    }

    fn delete_membership(&mut self, id: MembershipId) -> Result<(), StoreError> {
        self.members
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing("membership", id))
    }

    fn insert_join_request(&mut self, request: JoinRequest) -> Result<(), StoreError> {
        self.join_requests.insert(request.id, request);
        Ok(())
    }

    fn update_join_request(&mut self, request: JoinRequest) -> Result<(), StoreError> {
        replace(&mut self.join_requests, request, "join request")
    }

    fn insert_event(&mut self, event: Event) -> Result<(), StoreError> {
        self.events.insert(event.id, event);
        Ok(())
    }

    fn delete_event(&mut self, id: EventId) -> Result<(), StoreError> {
        if self.events.remove(&id).is_none() {
            return Err(missing("event", id));
        }
        self.attendees.retain(|_, a| a.event_id != id);
        Ok(())
    }

    fn insert_attendee(&mut self, attendee: EventAttendee) -> Result<(), StoreError> {
        if self.attendee_for(attendee.event_id, attendee.user_id).is_some() {
            return Err(StoreError::UniqueViolation(
                "user is already on this event".to_string(),
            ));
        }
        self.attendees.insert(attendee.id, attendee);
        Ok(())
    }

    fn update_attendee(&mut self, attendee: EventAttendee) -> Result<(), StoreError> {
        replace(&mut self.attendees, attendee, "attendee")
    }

    fn delete_attendee(&mut self, id: AttendeeId) -> Result<(), StoreError> {
        self.attendees
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing("attendee", id))
    }

    fn append_audit(&mut self, entry: AuditEntry) -> Result<(), StoreError> {
        if self.reject_audit {
            return Err(StoreError::AuditWrite(format!(
                "audit sink rejected {}",
                entry.action
            )));
        }
        self.audit.push(entry);
        Ok(())
    }
}
