//! User record: identity, global role, location and chapter pointer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chapterhub_core::{ChapterId, CityId, DomainError, Entity, Location, StateId, UserId};

use crate::{Role, ScopeFields, Scoped, Target};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    /// Chapter pointer. Must agree with the membership table; lifecycle
    /// operations treat a pointer without a membership row as stale.
    pub chapter_id: Option<ChapterId>,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh, active, unverified `USER` account.
    pub fn register(
        id: UserId,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        location: Location,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let email = normalize_email(&email.into())?;
        Ok(Self {
            id,
            email,
            first_name: first_name.into().trim().to_string(),
            last_name: last_name.into().trim().to_string(),
            role: Role::User,
            state_id: location.state_id,
            city_id: location.city_id,
            chapter_id: None,
            is_active: true,
            is_verified: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn location(&self) -> Location {
        Location::new(self.state_id, self.city_id)
    }

    pub fn set_location(&mut self, location: Location, now: DateTime<Utc>) {
        self.state_id = location.state_id;
        self.city_id = location.city_id;
        self.updated_at = now;
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Canonical target descriptor for authorization.
    pub fn as_target(&self) -> Target {
        Target {
            user_id: Some(self.id),
            role: Some(self.role),
            state_id: self.state_id,
            city_id: self.city_id,
        }
    }

    /// Case-insensitive match on first/last name, email, or role name
    /// (spaces in the needle match underscores in the role).
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let role_needle = needle.replace(' ', "_");
        self.first_name.to_lowercase().contains(&needle)
            || self.last_name.to_lowercase().contains(&needle)
            || self.email.to_lowercase().contains(&needle)
            || self.role.as_str().to_lowercase().contains(&role_needle)
    }
}

/// Minimal structural email check, lowercased.
pub fn normalize_email(email: &str) -> Result<String, DomainError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(DomainError::validation("invalid email address"))
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

impl Scoped for User {
    fn scope_fields(&self) -> ScopeFields {
        ScopeFields {
            id: *self.id.as_uuid(),
            state_id: self.state_id,
            city_id: self.city_id,
            president_id: None,
        }
    }
}
