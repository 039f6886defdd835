//! Role changes: chapter-officer roles and global roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chapterhub_auth::{
    Actor, ChapterRole, LocationAnchor, Role, Target, can_assign_role, user_scope,
};
use chapterhub_chapters::AuditAction;
use chapterhub_core::{ChapterId, CityId, DomainError, Location, StateId, UserId};

use crate::audit;
use crate::mail::Mailer;
use crate::store::{Store, StoreRead};

use super::{
    Lifecycle, LifecycleResult, chapter_or_not_found, forbidden, scoped_user, user_or_not_found,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignChapterRole {
    pub chapter_id: ChapterId,
    pub user_id: UserId,
    /// `VICE_PRESIDENT`, `SECRETARY` or `USER`.
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignGlobalRole {
    pub user_id: UserId,
    pub role: Role,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub occurred_at: DateTime<Utc>,
}

impl<S: Store, M: Mailer> Lifecycle<S, M> {
    pub fn assign_chapter_role(
        &self,
        actor: &Actor,
        cmd: AssignChapterRole,
    ) -> LifecycleResult<()> {
        let chapter_role = ChapterRole::from_assignable(cmd.role).ok_or_else(|| {
            DomainError::validation(format!("role {} cannot be assigned in a chapter", cmd.role))
        })?;
        let now = cmd.occurred_at;

        self.store().transaction(|tx| -> LifecycleResult<_> {
            let chapter = chapter_or_not_found(&*tx, cmd.chapter_id)?;
            let mut user = user_or_not_found(&*tx, cmd.user_id)?;

            let target = Target {
                user_id: Some(user.id),
                role: Some(user.role),
                ..Target::at(chapter.location())
            };
            if !can_assign_role(actor, cmd.role, &target) {
                return Err(forbidden(
                    actor,
                    "assign_chapter_role",
                    "not permitted to assign this role here",
                ));
            }
            if actor.role == Role::President && chapter.president_id != Some(actor.user_id) {
                return Err(forbidden(
                    actor,
                    "assign_chapter_role",
                    "only this chapter's president may assign its roles",
                ));
            }
            let mut membership = tx
                .membership(cmd.chapter_id, cmd.user_id)
                .ok_or(DomainError::NotFound)?;
            if chapter.president_id == Some(user.id) || membership.is_president() {
                return Err(DomainError::conflict(
                    "the sitting president changes only through president assignment",
                )
                .into());
            }

            let previous = membership.role;
            membership.role = chapter_role;
            tx.update_membership(membership)?;

            user.role = chapter_role.global_role();
            if chapter_role.is_officer() {
                user.set_location(chapter.location(), now);
            } else {
                user.updated_at = now;
            }
            tx.update_user(user)?;

            audit::record(
                tx,
                AuditAction::ChapterRoleAssigned,
                actor.user_id,
                Some(cmd.user_id.to_string()),
                Some(json!({
                    "chapterId": cmd.chapter_id,
                    "from": previous.as_str(),
                    "to": chapter_role.as_str(),
                })),
                now,
            )?;
            Ok(())
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            chapter_id = %cmd.chapter_id,
            user_id = %cmd.user_id,
            role = %chapter_role,
            "chapter role assigned"
        );
        Ok(())
    }

    /// Change a user's global role and the location it is anchored to.
    pub fn assign_global_role(&self, actor: &Actor, cmd: AssignGlobalRole) -> LifecycleResult<()> {
        let destination = anchored_location(cmd.role, cmd.state_id, cmd.city_id)?;
        let now = cmd.occurred_at;

        let (old_role, new_role) = self.store().transaction(|tx| -> LifecycleResult<_> {
            check_location_exists(&*tx, &destination)?;
            let mut user = scoped_user(&*tx, &user_scope(actor), cmd.user_id)?;

            let current = user.as_target();
            let moved = Target {
                user_id: Some(user.id),
                role: Some(user.role),
                ..Target::at(destination)
            };
            if !can_assign_role(actor, cmd.role, &current)
                || !can_assign_role(actor, cmd.role, &moved)
            {
                return Err(forbidden(
                    actor,
                    "assign_global_role",
                    "not permitted to assign this role here",
                ));
            }

            let old_role = user.role;
            user.role = cmd.role;
            user.set_location(destination, now);
            tx.update_user(user)?;

            audit::record(
                tx,
                AuditAction::RoleAssigned,
                actor.user_id,
                Some(cmd.user_id.to_string()),
                Some(json!({
                    "oldRole": old_role,
                    "newRole": cmd.role,
                    "stateId": destination.state_id,
                    "cityId": destination.city_id,
                })),
                now,
            )?;
            Ok((old_role, cmd.role))
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            user_id = %cmd.user_id,
            old_role = %old_role,
            new_role = %new_role,
            "role assigned"
        );
        Ok(())
    }
}

/// The location a role must carry, built from the supplied ids.
fn anchored_location(
    role: Role,
    state_id: Option<StateId>,
    city_id: Option<CityId>,
) -> LifecycleResult<Location> {
    match role.anchor() {
        LocationAnchor::None => Ok(Location::new(state_id, city_id)),
        LocationAnchor::State => {
            let state_id = state_id
                .ok_or_else(|| DomainError::validation(format!("{role} requires a state")))?;
            Ok(Location::new(Some(state_id), city_id))
        }
        LocationAnchor::StateCity => match (state_id, city_id) {
            (Some(state_id), Some(city_id)) => Ok(Location::city(state_id, city_id)),
            _ => Err(DomainError::validation(format!("{role} requires a state and a city")).into()),
        },
    }
}

/// Referenced state and city exist and the city lies in the state.
pub(crate) fn check_location_exists<R>(r: &R, location: &Location) -> LifecycleResult<()>
where
    R: StoreRead + ?Sized,
{
    if let Some(state_id) = location.state_id {
        if r.state(state_id).is_none() {
            return Err(DomainError::validation("unknown state").into());
        }
    }
    if let Some(city_id) = location.city_id {
        let city = r
            .city(city_id)
            .ok_or_else(|| DomainError::validation("unknown city"))?;
        if location.state_id != Some(city.state_id) {
            return Err(DomainError::validation("city does not belong to the state").into());
        }
    }
    Ok(())
}
