//! Read side: scoped, paginated queries for the admin surfaces.
//!
//! Every query pushes the actor's scope filter into the store scan; a row
//! outside the actor's jurisdiction is never returned, and a single record
//! outside it reads as `NotFound`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use chapterhub_auth::{
    Actor, AuthzError, Role, ScopeFilter, User, chapter_scope, require_role, user_scope,
};
use chapterhub_chapters::{
    AuditEntry, Chapter, ChapterMember, ChapterStatus, City, Event, JoinRequest, State,
};
use chapterhub_core::{ChapterId, CityId, DomainError, StateId};

use crate::store::{ChapterScan, Store, StoreError, StoreRead, UserScan, Window};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
/// Addable-user search returns at most this many rows.
pub const ADDABLE_SEARCH_LIMIT: usize = 10;
const ADDABLE_SEARCH_MIN_LEN: usize = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthzError> for DirectoryError {
    fn from(value: AuthzError) -> Self {
        DirectoryError::Domain(value.into())
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Result<Self, DomainError> {
        if page == 0 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn window(&self) -> Window {
        Window::new(
            (self.page.saturating_sub(1) as usize) * self.limit as usize,
            self.limit as usize,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

impl<T> Paged<T> {
    fn new(items: Vec<T>, total: usize, page: Page) -> Self {
        Self {
            items,
            total,
            page: page.page,
            limit: page.limit,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.limit.max(1) as usize)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterFilter {
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub status: Option<ChapterStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub chapter: Chapter,
    pub member_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDetail {
    pub chapter: Chapter,
    pub member_count: usize,
    pub pending_requests: usize,
}

/// A membership joined with its user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub membership: ChapterMember,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSummary {
    pub event: Event,
    pub attendee_count: usize,
}

fn non_blank(search: Option<String>) -> Option<String> {
    search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve a chapter through a scope filter.
fn scoped_chapter<R>(r: &R, scope: &ScopeFilter, id: ChapterId) -> DirectoryResult<Chapter>
where
    R: StoreRead + ?Sized,
{
    r.chapter(id)
        .filter(|c| scope.admits(c))
        .ok_or_else(|| DomainError::NotFound.into())
}

pub struct Directory<S> {
    store: S,
}

impl<S: Store> Directory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn states(&self) -> DirectoryResult<Vec<State>> {
        self.store.read(|r| Ok(r.states()))
    }

    pub fn cities(&self, state_id: StateId) -> DirectoryResult<Vec<City>> {
        self.store.read(|r| Ok(r.cities_in(state_id)))
    }

    pub fn list_users(
        &self,
        actor: &Actor,
        filter: UserFilter,
        page: Page,
    ) -> DirectoryResult<Paged<User>> {
        let scan = UserScan {
            role: filter.role,
            state_id: filter.state_id,
            city_id: filter.city_id,
            search: non_blank(filter.search),
            window: page.window(),
            ..UserScan::new(user_scope(actor))
        };
        self.store
            .read(|r| Ok(Paged::new(r.users(&scan), r.count_users(&scan), page)))
    }

    pub fn list_chapters(
        &self,
        actor: &Actor,
        filter: ChapterFilter,
        page: Page,
    ) -> DirectoryResult<Paged<ChapterSummary>> {
        let scan = ChapterScan {
            state_id: filter.state_id,
            city_id: filter.city_id,
            status: filter.status,
            search: non_blank(filter.search),
            window: page.window(),
            ..ChapterScan::new(chapter_scope(actor))
        };
        self.store.read(|r| {
            let items = r
                .chapters(&scan)
                .into_iter()
                .map(|chapter| ChapterSummary {
                    member_count: r.chapter_members(chapter.id).len(),
                    chapter,
                })
                .collect();
            Ok(Paged::new(items, r.count_chapters(&scan), page))
        })
    }

    pub fn get_chapter(&self, actor: &Actor, chapter_id: ChapterId) -> DirectoryResult<ChapterDetail> {
        self.store.read(|r| {
            let chapter = scoped_chapter(r, &chapter_scope(actor), chapter_id)?;
            Ok(ChapterDetail {
                member_count: r.chapter_members(chapter.id).len(),
                pending_requests: r.pending_join_requests(chapter.id).len(),
                chapter,
            })
        })
    }

    /// Newest joiners first.
    pub fn list_members(
        &self,
        actor: &Actor,
        chapter_id: ChapterId,
        page: Page,
    ) -> DirectoryResult<Paged<MemberView>> {
        self.store.read(|r| {
            let chapter = scoped_chapter(r, &chapter_scope(actor), chapter_id)?;
            let members = r.chapter_members(chapter.id);
            let total = members.len();
            let items = page
                .window()
                .apply(members)
                .into_iter()
                .filter_map(|membership| {
                    r.user(membership.user_id)
                        .map(|user| MemberView { membership, user })
                })
                .collect();
            Ok(Paged::new(items, total, page))
        })
    }

    pub fn pending_join_requests(
        &self,
        actor: &Actor,
        chapter_id: ChapterId,
    ) -> DirectoryResult<Vec<JoinRequest>> {
        self.store.read(|r| {
            let chapter = scoped_chapter(r, &chapter_scope(actor), chapter_id)?;
            Ok(r.pending_join_requests(chapter.id))
        })
    }

    /// `USER`-role accounts with no membership row, for the add-member picker.
    /// A stale chapter pointer does not hide a user.
    pub fn search_addable_users(&self, actor: &Actor, query: &str) -> DirectoryResult<Vec<User>> {
        require_role(actor, Role::dashboard_roles())?;
        let query = query.trim();
        if query.chars().count() < ADDABLE_SEARCH_MIN_LEN {
            return Err(DomainError::validation(format!(
                "search needs at least {ADDABLE_SEARCH_MIN_LEN} characters"
            ))
            .into());
        }

        let scan = UserScan {
            role: Some(Role::User),
            search: Some(query.to_string()),
            without_membership: true,
            window: Window::new(0, ADDABLE_SEARCH_LIMIT),
            ..UserScan::new(ScopeFilter::Unrestricted)
        };
        self.store.read(|r| Ok(r.users(&scan)))
    }

    /// Newest first, each with its attendee count.
    pub fn list_meetings(
        &self,
        actor: &Actor,
        chapter_id: ChapterId,
    ) -> DirectoryResult<Vec<MeetingSummary>> {
        self.store.read(|r| {
            let chapter = scoped_chapter(r, &chapter_scope(actor), chapter_id)?;
            Ok(r.chapter_events(chapter.id)
                .into_iter()
                .map(|event| MeetingSummary {
                    attendee_count: r.event_attendees(event.id).len(),
                    event,
                })
                .collect())
        })
    }

    pub fn audit_trail(&self, actor: &Actor, page: Page) -> DirectoryResult<Paged<AuditEntry>> {
        require_role(actor, &[Role::SuperAdmin])?;
        self.store.read(|r| {
            Ok(Paged::new(
                r.audit_entries(page.window()),
                r.count_audit_entries(),
                page,
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use proptest::prelude::*;

    use chapterhub_auth::ChapterRole;
    use chapterhub_core::{Location, UserId};

    use super::*;
    use crate::lifecycle::testkit::World;
    use crate::store::InMemoryStore;

    fn directory(w: &World) -> Directory<Arc<InMemoryStore>> {
        Directory::new(w.store.clone())
    }

    proptest! {
        #[test]
        fn pages_tile_the_result_set(page in 1u32..50, limit in 1u32..=MAX_PAGE_SIZE) {
            let this = Page::new(page, limit).unwrap().window();
            let next = Page::new(page + 1, limit).unwrap().window();
            prop_assert_eq!(this.skip + limit as usize, next.skip);
            prop_assert_eq!(this.take, Some(limit as usize));
        }
    }

    #[test]
    fn page_bounds() {
        assert!(Page::new(0, 10).is_err());
        assert!(Page::new(1, 0).is_err());
        assert!(Page::new(1, 101).is_err());
        assert_eq!(Page::new(3, 20).unwrap().window(), Window::new(40, 20));
    }

    #[test]
    fn users_are_scoped_filtered_and_paged() {
        let w = World::new();
        let director = World::actor(&w.user(Role::CityDirector, w.here()));
        for _ in 0..3 {
            w.user(Role::User, w.here());
        }
        w.user(Role::User, Location::city(w.state.id, w.other_city.id));

        let page = directory(&w)
            .list_users(&director, UserFilter::default(), Page::new(1, 2).unwrap())
            .unwrap();
        // Three users plus the director, all in Bengaluru.
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 2);

        let directors = directory(&w)
            .list_users(
                &director,
                UserFilter {
                    search: Some("city director".to_string()),
                    ..UserFilter::default()
                },
                Page::default(),
            )
            .unwrap();
        assert_eq!(directors.total, 1);
        assert_eq!(directors.items[0].id, director.user_id);
    }

    #[test]
    fn plain_users_see_only_themselves() {
        let w = World::new();
        let me = w.user(Role::User, w.here());
        w.user(Role::User, w.here());

        let page = directory(&w)
            .list_users(&World::actor(&me), UserFilter::default(), Page::default())
            .unwrap();
        assert_eq!(page.items.iter().map(|u| u.id).collect::<Vec<_>>(), vec![me.id]);
    }

    #[test]
    fn chapters_carry_counts_and_hide_out_of_scope() {
        let w = World::new();
        let mine = w.chapter("Mine");
        let theirs = w.chapter("Theirs");
        let president = World::actor(&w.president(&mine));
        let member = w.user(Role::User, w.here());
        w.member(&mine, &member, ChapterRole::Member);

        let page = directory(&w)
            .list_chapters(&president, ChapterFilter::default(), Page::default())
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].chapter.id, mine.id);
        assert_eq!(page.items[0].member_count, 2);

        let err = directory(&w).get_chapter(&president, theirs.id).unwrap_err();
        assert_eq!(err, DirectoryError::Domain(DomainError::NotFound));
        let detail = directory(&w).get_chapter(&president, mine.id).unwrap();
        assert_eq!(detail.pending_requests, 0);
    }

    #[test]
    fn members_are_listed_newest_first() {
        let w = World::new();
        let chapter = w.chapter("Listed");
        let first = w.user(Role::User, w.here());
        let second = w.user(Role::User, w.here());
        w.member(&chapter, &first, ChapterRole::Member);
        w.member(&chapter, &second, ChapterRole::Member);

        let page = directory(&w)
            .list_members(&w.super_admin(), chapter.id, Page::default())
            .unwrap();
        let ids: Vec<UserId> = page.items.iter().map(|m| m.user.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn addable_search_excludes_members_but_not_stale_pointers() {
        let w = World::new();
        let chapter = w.chapter("Searchable");
        let member = w.user(Role::User, w.here());
        w.member(&chapter, &member, ChapterRole::Member);
        let free = w.user(Role::User, w.here());
        let stale = w.user(Role::User, w.here());
        w.store
            .transaction(|tx| {
                let mut u = tx.user(stale.id).unwrap();
                u.chapter_id = Some(chapter.id);
                tx.update_user(u)
            })
            .map_err(|e: StoreError| e)
            .unwrap();
        let director = World::actor(&w.user(Role::CityDirector, w.here()));

        let found: Vec<UserId> = directory(&w)
            .search_addable_users(&director, "example.org")
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert!(found.contains(&free.id));
        assert!(found.contains(&stale.id));
        assert!(!found.contains(&member.id));
        assert!(!found.contains(&director.user_id));

        assert!(matches!(
            directory(&w).search_addable_users(&director, "e"),
            Err(DirectoryError::Domain(DomainError::Validation(_)))
        ));
        let vp = World::actor(&w.user(Role::VicePresident, w.here()));
        assert!(matches!(
            directory(&w).search_addable_users(&vp, "example"),
            Err(DirectoryError::Domain(DomainError::Forbidden(_)))
        ));
    }

    #[test]
    fn meetings_carry_attendee_counts() {
        let w = World::new();
        let chapter = w.chapter("Meets");
        let later = w.event(&chapter, Duration::days(9));
        let sooner = w.event(&chapter, Duration::days(1));
        let member = w.user(Role::User, w.here());
        w.store
            .transaction(|tx| {
                tx.insert_attendee(chapterhub_chapters::EventAttendee::invite(
                    sooner.id, member.id, w.now,
                ))
            })
            .map_err(|e: StoreError| e)
            .unwrap();

        let meetings = directory(&w)
            .list_meetings(&w.super_admin(), chapter.id)
            .unwrap();
        assert_eq!(meetings[0].event.id, later.id);
        assert_eq!(meetings[1].attendee_count, 1);
    }

    #[test]
    fn audit_trail_is_super_admin_only() {
        let w = World::new();
        let director = World::actor(&w.user(Role::StateDirector, Location::state(w.state.id)));
        assert!(matches!(
            directory(&w).audit_trail(&director, Page::default()),
            Err(DirectoryError::Domain(DomainError::Forbidden(_)))
        ));
        let trail = directory(&w).audit_trail(&w.super_admin(), Page::default()).unwrap();
        assert_eq!(trail.total, 0);
    }
}
