use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chapterhub_auth::{ChapterTarget, ScopeFields, Scoped};
use chapterhub_core::{ChapterId, CityId, DomainError, Entity, Location, StateId, UserId};

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 100;

/// Chapter status lifecycle. Only `ACTIVE` chapters take auto-joins and
/// join requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChapterStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub name: String,
    pub description: Option<String>,
    pub state_id: StateId,
    pub city_id: CityId,
    pub president_id: Option<UserId>,
    pub status: ChapterStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    /// A new `ACTIVE` chapter with no president.
    pub fn create(
        id: ChapterId,
        name: &str,
        description: Option<String>,
        state_id: StateId,
        city_id: CityId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = validate_name(name)?;
        Ok(Self {
            id,
            name,
            description: description.filter(|d| !d.trim().is_empty()),
            state_id,
            city_id,
            president_id: None,
            status: ChapterStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn location(&self) -> Location {
        Location::city(self.state_id, self.city_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == ChapterStatus::Active
    }

    pub fn as_target(&self) -> ChapterTarget {
        ChapterTarget {
            location: self.location(),
            president_id: self.president_id,
        }
    }
}

/// Trimmed name of 3–100 characters.
pub fn validate_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(DomainError::validation(format!(
            "chapter name must be {NAME_MIN_LEN}-{NAME_MAX_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

impl Entity for Chapter {
    type Id = ChapterId;

    fn id(&self) -> ChapterId {
        self.id
    }
}

impl Scoped for Chapter {
    fn scope_fields(&self) -> ScopeFields {
        ScopeFields {
            id: *self.id.as_uuid(),
            state_id: Some(self.state_id),
            city_id: Some(self.city_id),
            president_id: self.president_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn create_is_active_without_president() {
        let c = Chapter::create(
            ChapterId::new(),
            "  Bengaluru North ",
            Some("   ".to_string()),
            StateId::new(),
            CityId::new(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(c.name, "Bengaluru North");
        assert_eq!(c.description, None);
        assert_eq!(c.status, ChapterStatus::Active);
        assert_eq!(c.president_id, None);
        assert!(c.location().is_complete());
    }

    #[test]
    fn name_bounds() {
        assert!(validate_name("ab").is_err());
        assert!(validate_name("   abc   ").is_ok());
        assert!(validate_name(&"x".repeat(100)).is_ok());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: accepted names are always trimmed and within bounds.
        #[test]
        fn accepted_names_are_trimmed_and_bounded(name in "\\PC{0,120}") {
            if let Ok(n) = validate_name(&name) {
                prop_assert_eq!(n.trim(), n.as_str());
                let len = n.chars().count();
                prop_assert!((NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len));
            }
        }
    }
}
