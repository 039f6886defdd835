//! Account lifecycle: registration, activation, verification, location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chapterhub_auth::{
    Actor, LocationAnchor, Role, User, can_verify_users, require_role, user_scope,
};
use chapterhub_chapters::AuditAction;
use chapterhub_core::{CityId, DomainError, Location, StateId, UserId};

use crate::audit;
use crate::auto_join::{AutoJoinOutcome, RelocateOutcome, relocate_in, resolve};
use crate::mail::Mailer;
use crate::store::Store;

use super::membership::detach_from_all;
use super::roles::check_location_exists;
use super::{Lifecycle, LifecycleResult, forbidden, scoped_user};

/// Roles allowed to activate and deactivate accounts.
const ACCOUNT_ADMINS: &[Role] = &[Role::SuperAdmin, Role::StateDirector, Role::CityDirector];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub user: User,
    pub auto_join: AutoJoinOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateUser {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateUser {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleVerification {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLocation {
    pub user_id: UserId,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub occurred_at: DateTime<Utc>,
}

impl<S: Store, M: Mailer> Lifecycle<S, M> {
    /// Create a `USER` account and auto-join it in the same transaction.
    pub fn register_user(&self, cmd: RegisterUser) -> LifecycleResult<Registration> {
        let now = cmd.occurred_at;
        let location = Location::new(cmd.state_id, cmd.city_id);
        let user = User::register(
            UserId::new(),
            cmd.email,
            cmd.first_name,
            cmd.last_name,
            location,
            now,
        )?;
        if user.first_name.is_empty() {
            return Err(DomainError::validation("first name is required").into());
        }

        let (registration, invitations) = self.store().transaction(|tx| -> LifecycleResult<_> {
            check_location_exists(&*tx, &location)?;
            if tx.user_by_email(&user.email).is_some() {
                return Err(DomainError::conflict("email is already registered").into());
            }
            tx.insert_user(user.clone())?;

            let (auto_join, invitations) = resolve(tx, user.id, now)?;
            let user = tx.user(user.id).unwrap_or_else(|| user.clone());
            Ok((Registration { user, auto_join }, invitations))
        })?;

        tracing::info!(
            user_id = %registration.user.id,
            auto_joined = registration.auto_join.joined(),
            "user registered"
        );
        self.invites().dispatch(invitations);
        Ok(registration)
    }

    /// Deactivate an account and drop every membership it holds. The global
    /// role is left as it was.
    pub fn deactivate_user(&self, actor: &Actor, cmd: DeactivateUser) -> LifecycleResult<()> {
        require_role(actor, ACCOUNT_ADMINS)?;
        let now = cmd.occurred_at;

        let removed = self.store().transaction(|tx| -> LifecycleResult<_> {
            let mut user = scoped_user(&*tx, &user_scope(actor), cmd.user_id)?;
            if user.id == actor.user_id {
                return Err(forbidden(
                    actor,
                    "deactivate_user",
                    "cannot deactivate your own account",
                ));
            }

            let removed = detach_from_all(tx, user.id, now)?;
            // Re-read: detaching rewrote the chapter pointer.
            user = tx.user(user.id).unwrap_or(user);
            user.is_active = false;
            user.updated_at = now;
            tx.update_user(user)?;

            audit::record(
                tx,
                AuditAction::UserDeactivated,
                actor.user_id,
                Some(cmd.user_id.to_string()),
                Some(json!({ "removedMemberships": removed })),
                now,
            )?;
            Ok(removed)
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            user_id = %cmd.user_id,
            removed,
            "user deactivated"
        );
        Ok(())
    }

    pub fn activate_user(&self, actor: &Actor, cmd: ActivateUser) -> LifecycleResult<()> {
        require_role(actor, ACCOUNT_ADMINS)?;
        let now = cmd.occurred_at;

        self.store().transaction(|tx| -> LifecycleResult<_> {
            let mut user = scoped_user(&*tx, &user_scope(actor), cmd.user_id)?;
            user.is_active = true;
            user.updated_at = now;
            tx.update_user(user)?;
            audit::record(
                tx,
                AuditAction::UserActivated,
                actor.user_id,
                Some(cmd.user_id.to_string()),
                None,
                now,
            )?;
            Ok(())
        })?;

        tracing::info!(actor_id = %actor.user_id, user_id = %cmd.user_id, "user activated");
        Ok(())
    }

    /// Flip `is_verified`; returns the new value.
    pub fn toggle_verification(
        &self,
        actor: &Actor,
        cmd: ToggleVerification,
    ) -> LifecycleResult<bool> {
        if !can_verify_users(actor) {
            return Err(forbidden(
                actor,
                "toggle_verification",
                "role cannot verify users",
            ));
        }
        let now = cmd.occurred_at;

        let verified = self.store().transaction(|tx| -> LifecycleResult<_> {
            let mut user = scoped_user(&*tx, &user_scope(actor), cmd.user_id)?;
            user.is_verified = !user.is_verified;
            user.updated_at = now;
            let verified = user.is_verified;
            tx.update_user(user)?;

            let action = if verified {
                AuditAction::UserVerified
            } else {
                AuditAction::UserUnverified
            };
            audit::record(
                tx,
                action,
                actor.user_id,
                Some(cmd.user_id.to_string()),
                None,
                now,
            )?;
            Ok(verified)
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            user_id = %cmd.user_id,
            verified,
            "verification toggled"
        );
        Ok(verified)
    }

    /// Move a user (oneself, or someone in an administrator's scope) and
    /// rejoin the chapter matching the new location.
    pub fn update_location(
        &self,
        actor: &Actor,
        cmd: UpdateLocation,
    ) -> LifecycleResult<RelocateOutcome> {
        let location = Location::new(cmd.state_id, cmd.city_id);
        if location.city_id.is_some() && location.state_id.is_none() {
            return Err(DomainError::validation("a city requires its state").into());
        }
        let acting_on_self = actor.user_id == cmd.user_id;
        if !acting_on_self {
            require_role(actor, ACCOUNT_ADMINS)?;
        }
        let now = cmd.occurred_at;

        let (outcome, invitations) = self.store().transaction(|tx| -> LifecycleResult<_> {
            check_location_exists(&*tx, &location)?;
            let user = if acting_on_self {
                super::user_or_not_found(&*tx, cmd.user_id)?
            } else {
                scoped_user(&*tx, &user_scope(actor), cmd.user_id)?
            };
            check_anchor(user.role, &location)?;
            let previous = user.location();

            let (outcome, invitations) = relocate_in(tx, user.id, location, now)?;

            audit::record(
                tx,
                AuditAction::LocationUpdated,
                actor.user_id,
                Some(cmd.user_id.to_string()),
                Some(json!({
                    "from": { "stateId": previous.state_id, "cityId": previous.city_id },
                    "to": { "stateId": location.state_id, "cityId": location.city_id },
                    "removedMemberships": outcome.removed,
                })),
                now,
            )?;
            Ok((outcome, invitations))
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            user_id = %cmd.user_id,
            removed = outcome.removed,
            joined = outcome.joined.joined(),
            "location updated"
        );
        self.invites().dispatch(invitations);
        Ok(outcome)
    }
}

/// An anchored role may not be moved off its anchor shape.
fn check_anchor(role: Role, location: &Location) -> LifecycleResult<()> {
    let ok = match role.anchor() {
        LocationAnchor::None => true,
        LocationAnchor::State => location.state_id.is_some(),
        LocationAnchor::StateCity => location.is_complete(),
    };
    if ok {
        Ok(())
    } else {
        Err(DomainError::validation(format!("{role} must keep a location")).into())
    }
}
