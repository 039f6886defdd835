//! Fixtures shared by the lifecycle, auto-join and directory tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

use chapterhub_auth::{Actor, ChapterRole, Role, User};
use chapterhub_chapters::{Chapter, ChapterMember, City, Event, EventType, State};
use chapterhub_core::{ChapterId, EventId, Location, UserId};

use crate::config::AppConfig;
use crate::mail::RecordingMailer;
use crate::store::{InMemoryStore, Store, StoreError, StoreRead};

use super::Lifecycle;

pub(crate) const PAYMENT_SECRET: &str = "test-payment-secret";

pub(crate) struct World {
    pub lifecycle: Lifecycle<Arc<InMemoryStore>, Arc<RecordingMailer>>,
    pub store: Arc<InMemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub state: State,
    pub city: City,
    pub other_city: City,
    pub other_state: State,
    pub now: DateTime<Utc>,
    seq: AtomicI64,
}

impl World {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let config = AppConfig {
            mail_from: Some("noreply@example.org".to_string()),
            payment_secret: Some(PAYMENT_SECRET.to_string()),
            ..AppConfig::default()
        };

        let state = State::new("Karnataka", "KA");
        let city = City::new("Bengaluru", state.id);
        let other_city = City::new("Mysuru", state.id);
        let other_state = State::new("Kerala", "KL");
        store
            .transaction(|tx| {
                tx.insert_state(state.clone())?;
                tx.insert_state(other_state.clone())?;
                tx.insert_city(city.clone())?;
                tx.insert_city(other_city.clone())?;
                tx.insert_city(City::new("Kochi", other_state.id))
            })
            .map_err(|e: StoreError| e)
            .unwrap();

        Self {
            lifecycle: Lifecycle::new(store.clone(), mailer.clone(), config),
            store,
            mailer,
            state,
            city,
            other_city,
            other_state,
            now: Utc::now(),
            seq: AtomicI64::new(0),
        }
    }

    fn next(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Strictly increasing creation times, all in the past.
    fn stamp(&self) -> DateTime<Utc> {
        self.now - Duration::days(30) + Duration::seconds(self.next())
    }

    pub fn here(&self) -> Location {
        Location::city(self.state.id, self.city.id)
    }

    pub fn read<T>(&self, f: impl FnOnce(&dyn StoreRead) -> T) -> T {
        self.store
            .read(|r| Ok::<_, StoreError>(f(r)))
            .unwrap()
    }

    pub fn user(&self, role: Role, location: Location) -> User {
        let n = self.next();
        let mut user = User::register(
            UserId::new(),
            format!("user{n}@example.org"),
            format!("First{n}"),
            format!("Last{n}"),
            location,
            self.stamp(),
        )
        .unwrap();
        user.role = role;
        self.store
            .transaction(|tx| tx.insert_user(user.clone()))
            .map_err(|e: StoreError| e)
            .unwrap();
        user
    }

    pub fn actor(user: &User) -> Actor {
        Actor::new(user.id, user.role, user.location())
    }

    pub fn super_admin(&self) -> Actor {
        Self::actor(&self.user(Role::SuperAdmin, Location::default()))
    }

    pub fn chapter_at(&self, name: &str, location: Location) -> Chapter {
        let chapter = Chapter::create(
            ChapterId::new(),
            name,
            None,
            location.state_id.unwrap(),
            location.city_id.unwrap(),
            self.stamp(),
        )
        .unwrap();
        self.store
            .transaction(|tx| tx.insert_chapter(chapter.clone()))
            .map_err(|e: StoreError| e)
            .unwrap();
        chapter
    }

    pub fn chapter(&self, name: &str) -> Chapter {
        self.chapter_at(name, self.here())
    }

    /// Membership row plus chapter pointer, written directly.
    pub fn member(&self, chapter: &Chapter, user: &User, role: ChapterRole) -> ChapterMember {
        let mut membership = ChapterMember::join(chapter.id, user.id, self.stamp());
        membership.role = role;
        self.store
            .transaction(|tx| {
                tx.insert_membership(membership.clone())?;
                let mut u = tx.user(user.id).unwrap();
                u.chapter_id = Some(chapter.id);
                tx.update_user(u)
            })
            .map_err(|e: StoreError| e)
            .unwrap();
        membership
    }

    /// A sitting president: global role, membership role and chapter pointer.
    pub fn president(&self, chapter: &Chapter) -> User {
        let user = self.user(Role::President, chapter.location());
        self.member(chapter, &user, ChapterRole::President);
        self.store
            .transaction(|tx| {
                let mut c = tx.chapter(chapter.id).unwrap();
                c.president_id = Some(user.id);
                tx.update_chapter(c)
            })
            .map_err(|e: StoreError| e)
            .unwrap();
        user
    }

    pub fn event(&self, chapter: &Chapter, offset: Duration) -> Event {
        let event = Event {
            id: EventId::new(),
            title: format!("Meeting {}", self.next()),
            description: String::new(),
            event_type: EventType::Meeting,
            venue: None,
            date: self.now + offset,
            recurrence: None,
            entry_fee: 0,
            is_public: true,
            chapter_id: Some(chapter.id),
            creator_id: UserId::new(),
            created_at: self.stamp(),
        };
        self.store
            .transaction(|tx| tx.insert_event(event.clone()))
            .map_err(|e: StoreError| e)
            .unwrap();
        event
    }

    pub fn audit_count(&self) -> usize {
        self.read(|r| r.count_audit_entries())
    }
}
