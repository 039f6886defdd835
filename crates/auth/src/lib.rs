//! `chapterhub-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from storage and transport: every
//! decision here is a total function of an [`Actor`] and a target descriptor.

pub mod authorize;
pub mod claims;
pub mod principal;
pub mod roles;
pub mod scope;
pub mod user;

pub use authorize::{
    AuthzError, can_assign_president, can_assign_role, can_create_chapter, can_delete_chapter,
    can_delete_event, can_manage_members, can_remove_attendee, can_review_join_requests,
    can_schedule_meeting, can_verify_users, covers_location, require_role,
};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use principal::{Actor, ChapterTarget, Target, authenticate};
pub use roles::{ChapterRole, LocationAnchor, Role};
pub use scope::{ScopeFields, ScopeFilter, Scoped, chapter_scope, user_scope};
pub use user::User;
