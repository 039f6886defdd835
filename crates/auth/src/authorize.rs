//! Authorization engine.
//!
//! - No IO
//! - No panics
//! - Every predicate is total over roles; any branch not listed denies.

use thiserror::Error;

use chapterhub_core::{CityId, DomainError, Location, StateId, UserId};

use crate::{Actor, ChapterRole, ChapterTarget, Role, Target};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Unauthenticated => DomainError::Unauthenticated,
            AuthzError::Forbidden(msg) => DomainError::Forbidden(msg),
        }
    }
}

/// Fail with [`AuthzError::Forbidden`] unless the actor holds one of `allowed`.
pub fn require_role(actor: &Actor, allowed: &[Role]) -> Result<(), AuthzError> {
    if actor.has_role(allowed) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(format!(
            "role {} is not permitted here",
            actor.role
        )))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Jurisdiction
// ─────────────────────────────────────────────────────────────────────────────

/// Broader-or-equal jurisdiction over a location.
///
/// SUPER_ADMIN always; STATE_DIRECTOR on its state; CITY_DIRECTOR on its state
/// and city. An actor missing its anchor covers nothing.
pub fn covers_location(actor: &Actor, location: &Location) -> bool {
    let own = actor.location();
    match actor.role {
        Role::SuperAdmin => true,
        Role::StateDirector => own.same_state(location),
        Role::CityDirector => own.same_state(location) && own.same_city(location),
        Role::President | Role::VicePresident | Role::Secretary | Role::User => false,
    }
}

pub fn can_assign_president(actor: &Actor, chapter: &ChapterTarget) -> bool {
    covers_location(actor, &chapter.location)
}

pub fn can_create_chapter(actor: &Actor, state_id: StateId, city_id: CityId) -> bool {
    covers_location(actor, &Location::city(state_id, city_id))
}

pub fn can_delete_chapter(actor: &Actor, chapter: &ChapterTarget) -> bool {
    covers_location(actor, &chapter.location)
}

pub fn can_verify_users(actor: &Actor) -> bool {
    matches!(actor.role, Role::SuperAdmin | Role::StateDirector)
}

// ─────────────────────────────────────────────────────────────────────────────
// Role assignment
// ─────────────────────────────────────────────────────────────────────────────

/// Whether `actor` may give `target_role` to `target`.
///
/// Self-assignment is always denied, as is any role not strictly narrower than
/// the actor's own. When `target.role` is known the target's current role must
/// be strictly narrower too.
pub fn can_assign_role(actor: &Actor, target_role: Role, target: &Target) -> bool {
    if target.user_id == Some(actor.user_id) {
        return false;
    }
    if !actor.role.is_broader_than(target_role) {
        return false;
    }
    if target.role.is_some_and(|current| !actor.role.is_broader_than(current)) {
        return false;
    }

    let own = actor.location();
    let at = target.location();
    match (actor.role, target_role) {
        (Role::SuperAdmin, Role::StateDirector | Role::CityDirector | Role::President) => true,
        (Role::StateDirector, Role::CityDirector) => own.same_state(&at),
        (Role::CityDirector, Role::President) => own.same_city(&at),
        (Role::President, Role::VicePresident | Role::Secretary | Role::User) => {
            own.same_city(&at)
        }
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chapter-level authority
// ─────────────────────────────────────────────────────────────────────────────

/// Add/remove members: jurisdiction over the chapter, or its sitting president.
pub fn can_manage_members(actor: &Actor, chapter: &ChapterTarget) -> bool {
    covers_location(actor, &chapter.location)
        || (actor.role == Role::President && chapter.is_presided_by(actor.user_id))
}

pub fn can_review_join_requests(actor: &Actor, chapter: &ChapterTarget) -> bool {
    actor.role == Role::President && chapter.is_presided_by(actor.user_id)
}

/// `membership_role` is the actor's role inside *this* chapter, if a member.
pub fn can_schedule_meeting(
    actor: &Actor,
    chapter: &ChapterTarget,
    membership_role: Option<ChapterRole>,
) -> bool {
    covers_location(actor, &chapter.location)
        || chapter.is_presided_by(actor.user_id)
        || membership_role.is_some_and(|r| r.is_officer())
}

pub fn can_delete_event(
    actor: &Actor,
    creator_id: Option<UserId>,
    chapter: Option<&ChapterTarget>,
) -> bool {
    actor.role == Role::SuperAdmin
        || creator_id == Some(actor.user_id)
        || (actor.role == Role::President
            && chapter.is_some_and(|c| c.is_presided_by(actor.user_id)))
}

pub fn can_remove_attendee(
    actor: &Actor,
    creator_id: Option<UserId>,
    chapter: Option<&ChapterTarget>,
) -> bool {
    can_delete_event(actor, creator_id, chapter)
        || (actor.role.is_director() && chapter.is_some_and(|c| covers_location(actor, &c.location)))
}
