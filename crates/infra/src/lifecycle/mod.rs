//! Entity lifecycle manager.
//!
//! Every privileged mutation runs through [`Lifecycle`]: the authorization
//! decision, the invariant checks and every write (audit row included) happen
//! inside one store transaction, so a failure at any step leaves no trace.
//! Invitation mail is the only side effect outside the transaction; it is
//! handed to the [`InviteDispatcher`] after commit.
//!
//! ## Error mapping
//!
//! - input problems → `Validation` (checked before any authorization)
//! - ids that don't resolve, or resolve outside the actor's scope → `NotFound`
//! - authenticated but not allowed → `Forbidden`
//! - invariant would break (duplicates, terminal requests, sitting
//!   president) → `Conflict`; a store unique violation maps here too

use thiserror::Error;

use chapterhub_auth::{Actor, AuthzError, ScopeFilter, User};
use chapterhub_chapters::Chapter;
use chapterhub_core::{ChapterId, DomainError, UserId};

use crate::config::AppConfig;
use crate::mail::{InviteDispatcher, Mailer};
use crate::payment::PaymentVerifier;
use crate::store::{StoreError, StoreRead};

pub mod accounts;
pub mod chapters;
pub mod join_requests;
pub mod meetings;
pub mod members;
pub(crate) mod membership;
pub mod president;
pub mod roles;

pub use accounts::{
    ActivateUser, DeactivateUser, RegisterUser, Registration, ToggleVerification, UpdateLocation,
};
pub use chapters::{CreateChapter, DeleteChapter};
pub use join_requests::{ProcessJoinRequest, SubmitJoinRequest};
pub use meetings::{CreateMeeting, DeleteEvent, RemoveAttendee, VerifyPayment};
pub use members::{AddMember, AddMemberOutcome, RemoveMember};
pub use president::AssignPresident;
pub use roles::{AssignChapterRole, AssignGlobalRole};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            // A lost race on a unique pair is the same invariant violation as a
            // detected duplicate.
            StoreError::UniqueViolation(msg) => LifecycleError::Domain(DomainError::Conflict(msg)),
            other => LifecycleError::Store(other),
        }
    }
}

impl From<AuthzError> for LifecycleError {
    fn from(value: AuthzError) -> Self {
        LifecycleError::Domain(value.into())
    }
}

impl LifecycleError {
    /// The domain error, if this is one.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            LifecycleError::Domain(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.domain(), Some(DomainError::NotFound))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self.domain(), Some(DomainError::Forbidden(_)))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.domain(), Some(DomainError::Conflict(_)))
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self.domain(),
            Some(DomainError::Validation(_) | DomainError::InvalidId(_))
        )
    }
}

/// Orchestrates the multi-row state transitions against a [`crate::store::Store`].
pub struct Lifecycle<S, M> {
    store: S,
    invites: InviteDispatcher<M>,
    payments: Option<PaymentVerifier>,
}

impl<S, M: Mailer> Lifecycle<S, M> {
    pub fn new(store: S, mailer: M, config: AppConfig) -> Self {
        let payments = PaymentVerifier::from_config(&config);
        Self {
            store,
            invites: InviteDispatcher::new(mailer, config),
            payments,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn invites(&self) -> &InviteDispatcher<M> {
        &self.invites
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared lookups and denials
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn forbidden(actor: &Actor, action: &'static str, reason: &str) -> LifecycleError {
    tracing::debug!(
        actor_id = %actor.user_id,
        role = %actor.role,
        action,
        reason,
        "authorization denied"
    );
    DomainError::forbidden(reason.to_string()).into()
}

pub(crate) fn chapter_or_not_found<R>(r: &R, id: ChapterId) -> LifecycleResult<Chapter>
where
    R: StoreRead + ?Sized,
{
    r.chapter(id).ok_or_else(|| DomainError::NotFound.into())
}

pub(crate) fn user_or_not_found<R>(r: &R, id: UserId) -> LifecycleResult<User>
where
    R: StoreRead + ?Sized,
{
    r.user(id).ok_or_else(|| DomainError::NotFound.into())
}

/// Resolve a user through a scope filter; out-of-scope is indistinguishable
/// from missing.
pub(crate) fn scoped_user<R>(r: &R, scope: &ScopeFilter, id: UserId) -> LifecycleResult<User>
where
    R: StoreRead + ?Sized,
{
    r.user(id)
        .filter(|u| scope.admits(u))
        .ok_or_else(|| DomainError::NotFound.into())
}

#[cfg(test)]
pub(crate) mod testkit;
