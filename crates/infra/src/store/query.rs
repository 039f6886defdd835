//! Filtered-scan descriptors.
//!
//! The scope filter travels with the scan so that the store applies it in the
//! same pass as the caller's own filters; a row outside the actor's
//! jurisdiction is never materialised.

use chapterhub_auth::{Role, ScopeFilter, User};
use chapterhub_chapters::{Chapter, ChapterStatus};
use chapterhub_core::{CityId, StateId};

/// Offset window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: usize,
    /// `None` means no limit.
    pub take: Option<usize>,
}

impl Window {
    pub const ALL: Window = Window {
        skip: 0,
        take: None,
    };

    pub fn new(skip: usize, take: usize) -> Self {
        Self {
            skip,
            take: Some(take),
        }
    }

    pub fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        let iter = rows.into_iter().skip(self.skip);
        match self.take {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }
}

/// Scan over users, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserScan {
    pub scope: ScopeFilter,
    pub role: Option<Role>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub search: Option<String>,
    /// Only users with no membership row at all (stale chapter pointers count
    /// as "no membership").
    pub without_membership: bool,
    pub window: Window,
}

impl UserScan {
    pub fn new(scope: ScopeFilter) -> Self {
        Self {
            scope,
            role: None,
            state_id: None,
            city_id: None,
            search: None,
            without_membership: false,
            window: Window::ALL,
        }
    }

    /// Row-level predicate, excluding `without_membership` (which needs the
    /// membership table and is evaluated by the store).
    pub fn matches(&self, user: &User) -> bool {
        self.scope.admits(user)
            && self.role.is_none_or(|r| user.role == r)
            && self.state_id.is_none_or(|s| user.state_id == Some(s))
            && self.city_id.is_none_or(|c| user.city_id == Some(c))
            && self.search.as_deref().is_none_or(|q| user.matches_search(q))
    }
}

/// Scan over chapters, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterScan {
    pub scope: ScopeFilter,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub status: Option<ChapterStatus>,
    pub search: Option<String>,
    pub window: Window,
}

impl ChapterScan {
    pub fn new(scope: ScopeFilter) -> Self {
        Self {
            scope,
            state_id: None,
            city_id: None,
            status: None,
            search: None,
            window: Window::ALL,
        }
    }

    pub fn matches(&self, chapter: &Chapter) -> bool {
        self.scope.admits(chapter)
            && self.state_id.is_none_or(|s| chapter.state_id == s)
            && self.city_id.is_none_or(|c| chapter.city_id == c)
            && self.status.is_none_or(|s| chapter.status == s)
            && self.search.as_deref().is_none_or(|q| {
                chapter
                    .name
                    .to_lowercase()
                    .contains(&q.trim().to_lowercase())
            })
    }
}
