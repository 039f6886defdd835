use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chapterhub_core::{CityId, Location, StateId, UserId};

use crate::{AuthzError, Role, SessionClaims, validate_claims};

/// Authenticated actor descriptor.
///
/// Built once at the session boundary by [`authenticate`]; every authorization
/// decision takes this and nothing else about the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role, location: Location) -> Self {
        Self {
            user_id,
            role,
            state_id: location.state_id,
            city_id: location.city_id,
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.state_id, self.city_id)
    }

    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}

/// Canonical description of a user being acted upon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub user_id: Option<UserId>,
    pub role: Option<Role>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

impl Target {
    /// A target known only by where it sits (e.g. a role's destination).
    pub fn at(location: Location) -> Self {
        Self {
            state_id: location.state_id,
            city_id: location.city_id,
            ..Default::default()
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.state_id, self.city_id)
    }
}

/// Canonical description of a chapter being acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterTarget {
    pub location: Location,
    pub president_id: Option<UserId>,
}

impl ChapterTarget {
    pub fn is_presided_by(&self, user_id: UserId) -> bool {
        self.president_id == Some(user_id)
    }
}

/// Turn (possibly absent) session claims into an [`Actor`].
///
/// Absent claims, an invalid time window, and unknown role strings all fail
/// with [`AuthzError::Unauthenticated`]; an unknown role never degrades into a
/// weaker known role.
pub fn authenticate(claims: Option<&SessionClaims>, now: DateTime<Utc>) -> Result<Actor, AuthzError> {
    let claims = claims.ok_or(AuthzError::Unauthenticated)?;
    validate_claims(claims, now).map_err(|_| AuthzError::Unauthenticated)?;
    let role = claims
        .role
        .parse::<Role>()
        .map_err(|_| AuthzError::Unauthenticated)?;

    Ok(Actor {
        user_id: claims.sub,
        role,
        state_id: claims.state_id,
        city_id: claims.city_id,
    })
}
