//! Presidency hand-over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chapterhub_auth::{Actor, ChapterRole, Role, can_assign_president};
use chapterhub_chapters::AuditAction;
use chapterhub_core::{ChapterId, DomainError, UserId};

use crate::audit;
use crate::mail::Mailer;
use crate::store::{Store, Transaction};

use super::{Lifecycle, LifecycleResult, chapter_or_not_found, forbidden, user_or_not_found};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignPresident {
    pub chapter_id: ChapterId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl<S: Store, M: Mailer> Lifecycle<S, M> {
    /// Make a member the chapter's president, demoting whoever held it.
    ///
    /// The outgoing president's global role only drops to `USER` if it is
    /// still `PRESIDENT`; a director filling in keeps their role. Calling this
    /// for the sitting president changes nothing. A member whose global role is
    /// as broad as the actor's cannot be made president by that actor.
    pub fn assign_president(&self, actor: &Actor, cmd: AssignPresident) -> LifecycleResult<()> {
        let now = cmd.occurred_at;
        let changed = self.store().transaction(|tx| -> LifecycleResult<_> {
            let mut chapter = chapter_or_not_found(&*tx, cmd.chapter_id)?;
            if !can_assign_president(actor, &chapter.as_target()) {
                return Err(forbidden(
                    actor,
                    "assign_president",
                    "no jurisdiction over this chapter",
                ));
            }

            let mut incoming = tx
                .membership(cmd.chapter_id, cmd.user_id)
                .ok_or_else(|| DomainError::validation("user is not a member of this chapter"))?;
            let mut user = user_or_not_found(&*tx, cmd.user_id)?;

            if chapter.president_id == Some(cmd.user_id)
                && incoming.role == ChapterRole::President
                && user.role == Role::President
            {
                return Ok(false);
            }
            if user.role != Role::President && !actor.role.is_broader_than(user.role) {
                return Err(forbidden(
                    actor,
                    "assign_president",
                    "cannot replace the role of a user at or above the actor's",
                ));
            }

            let previous = chapter.president_id.filter(|id| *id != cmd.user_id);
            if let Some(previous_id) = previous {
                step_down(tx, cmd.chapter_id, previous_id, now)?;
            }
            // Any other row still marked PRESIDENT would leave two presidents.
            for stale in tx.chapter_members(cmd.chapter_id) {
                if stale.role == ChapterRole::President
                    && stale.user_id != cmd.user_id
                    && Some(stale.user_id) != previous
                {
                    step_down(tx, cmd.chapter_id, stale.user_id, now)?;
                }
            }

            incoming.role = ChapterRole::President;
            tx.update_membership(incoming)?;

            user.role = Role::President;
            user.set_location(chapter.location(), now);
            tx.update_user(user)?;

            chapter.president_id = Some(cmd.user_id);
            chapter.updated_at = now;
            tx.update_chapter(chapter)?;

            audit::record(
                tx,
                AuditAction::PresidentAssigned,
                actor.user_id,
                Some(cmd.chapter_id.to_string()),
                Some(json!({
                    "userId": cmd.user_id,
                    "previousPresidentId": previous,
                })),
                now,
            )?;
            Ok(true)
        })?;

        if changed {
            tracing::info!(
                actor_id = %actor.user_id,
                chapter_id = %cmd.chapter_id,
                user_id = %cmd.user_id,
                "president assigned"
            );
        }
        Ok(())
    }
}

fn step_down(
    tx: &mut dyn Transaction,
    chapter_id: ChapterId,
    user_id: UserId,
    now: DateTime<Utc>,
) -> LifecycleResult<()> {
    if let Some(mut membership) = tx.membership(chapter_id, user_id) {
        if membership.role != ChapterRole::Member {
            membership.role = ChapterRole::Member;
            tx.update_membership(membership)?;
        }
    }
    if let Some(mut user) = tx.user(user_id) {
        if user.role == Role::President {
            user.role = Role::User;
            user.updated_at = now;
            tx.update_user(user)?;
        }
    }
    Ok(())
}
