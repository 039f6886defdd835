//! Chapter auto-join resolver.
//!
//! A user with a complete location joins the oldest `ACTIVE` chapter at that
//! exact state and city. Resolution is idempotent and keeps the
//! single-chapter invariant: a user who already holds any membership is
//! reported as such and nothing is written.
//!
//! [`relocate_in`] is the companion used whenever a user's location changes:
//! it drops every membership, moves the user, then resolves again. It is a
//! full remove-and-rejoin rather than a diff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chapterhub_core::{ChapterId, Location, MembershipId, UserId};

use crate::lifecycle::membership::{detach_from_all, enroll};
use crate::lifecycle::{Lifecycle, LifecycleResult, user_or_not_found};
use crate::mail::{Invitation, Mailer};
use crate::store::{Store, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AutoJoinOutcome {
    /// State or city missing.
    NoLocation,
    NoActiveChapter,
    AlreadyMember {
        chapter_id: ChapterId,
    },
    Joined {
        chapter_id: ChapterId,
        membership_id: MembershipId,
    },
}

impl AutoJoinOutcome {
    pub fn joined(&self) -> bool {
        matches!(self, AutoJoinOutcome::Joined { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocateOutcome {
    /// Membership rows dropped before rejoining.
    pub removed: usize,
    pub joined: AutoJoinOutcome,
}

/// Resolve inside an open transaction. Invitations are returned for dispatch
/// after commit.
pub(crate) fn resolve(
    tx: &mut dyn Transaction,
    user_id: UserId,
    now: DateTime<Utc>,
) -> LifecycleResult<(AutoJoinOutcome, Vec<Invitation>)> {
    let user = user_or_not_found(&*tx, user_id)?;
    let (Some(state_id), Some(city_id)) = (user.state_id, user.city_id) else {
        return Ok((AutoJoinOutcome::NoLocation, Vec::new()));
    };
    let Some(chapter) = tx.oldest_active_chapter(state_id, city_id) else {
        return Ok((AutoJoinOutcome::NoActiveChapter, Vec::new()));
    };
    if let Some(existing) = tx.user_memberships(user_id).into_iter().next() {
        return Ok((
            AutoJoinOutcome::AlreadyMember {
                chapter_id: existing.chapter_id,
            },
            Vec::new(),
        ));
    }

    let enrollment = enroll(tx, chapter.id, user_id, now)?;
    Ok((
        AutoJoinOutcome::Joined {
            chapter_id: chapter.id,
            membership_id: enrollment.membership.id,
        },
        enrollment.invitations,
    ))
}

/// Move a user and re-resolve their chapter inside an open transaction.
pub(crate) fn relocate_in(
    tx: &mut dyn Transaction,
    user_id: UserId,
    location: Location,
    now: DateTime<Utc>,
) -> LifecycleResult<(RelocateOutcome, Vec<Invitation>)> {
    let removed = detach_from_all(tx, user_id, now)?;

    let mut user = user_or_not_found(&*tx, user_id)?;
    user.set_location(location, now);
    tx.update_user(user)?;

    let (joined, invitations) = resolve(tx, user_id, now)?;
    Ok((RelocateOutcome { removed, joined }, invitations))
}

impl<S: Store, M: Mailer> Lifecycle<S, M> {
    /// Place a user in the chapter matching their current location.
    pub fn auto_join(&self, user_id: UserId, now: DateTime<Utc>) -> LifecycleResult<AutoJoinOutcome> {
        let (outcome, invitations) = self.store().transaction(|tx| resolve(tx, user_id, now))?;
        if let AutoJoinOutcome::Joined { chapter_id, .. } = outcome {
            tracing::info!(user_id = %user_id, chapter_id = %chapter_id, "auto-joined chapter");
        }
        self.invites().dispatch(invitations);
        Ok(outcome)
    }

    /// Set a user's location and rejoin accordingly.
    pub fn relocate(
        &self,
        user_id: UserId,
        location: Location,
        now: DateTime<Utc>,
    ) -> LifecycleResult<RelocateOutcome> {
        let (outcome, invitations) = self.store().transaction(|tx| -> LifecycleResult<_> {
            crate::lifecycle::roles::check_location_exists(&*tx, &location)?;
            relocate_in(tx, user_id, location, now)
        })?;
        tracing::info!(
            user_id = %user_id,
            removed = outcome.removed,
            joined = outcome.joined.joined(),
            "user relocated"
        );
        self.invites().dispatch(invitations);
        Ok(outcome)
    }
}
