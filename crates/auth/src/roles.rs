use core::str::FromStr;

use serde::{Deserialize, Serialize};

use chapterhub_core::DomainError;

/// Global role held by a user.
///
/// Variants are declared widest-first; `breadth()` gives the strict ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    StateDirector,
    CityDirector,
    President,
    VicePresident,
    Secretary,
    User,
}

/// Location shape a role must be anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationAnchor {
    None,
    State,
    StateCity,
}

impl Role {
    /// Every role, widest scope first.
    pub const ALL: [Role; 7] = [
        Role::SuperAdmin,
        Role::StateDirector,
        Role::CityDirector,
        Role::President,
        Role::VicePresident,
        Role::Secretary,
        Role::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::StateDirector => "STATE_DIRECTOR",
            Role::CityDirector => "CITY_DIRECTOR",
            Role::President => "PRESIDENT",
            Role::VicePresident => "VICE_PRESIDENT",
            Role::Secretary => "SECRETARY",
            Role::User => "USER",
        }
    }

    /// Scope breadth; higher is wider. Strict total order over [`Role::ALL`].
    pub fn breadth(&self) -> u8 {
        match self {
            Role::SuperAdmin => 6,
            Role::StateDirector => 5,
            Role::CityDirector => 4,
            Role::President => 3,
            Role::VicePresident => 2,
            Role::Secretary => 1,
            Role::User => 0,
        }
    }

    pub fn is_broader_than(&self, other: Role) -> bool {
        self.breadth() > other.breadth()
    }

    /// Location fields a holder of this role must carry.
    ///
    /// Chapter officers are stamped with their chapter's location, so they
    /// share the city-director shape.
    pub fn anchor(&self) -> LocationAnchor {
        match self {
            Role::SuperAdmin | Role::User => LocationAnchor::None,
            Role::StateDirector => LocationAnchor::State,
            Role::CityDirector | Role::President | Role::VicePresident | Role::Secretary => {
                LocationAnchor::StateCity
            }
        }
    }

    /// Roles allowed into administrative read surfaces.
    pub fn dashboard_roles() -> &'static [Role] {
        &[
            Role::SuperAdmin,
            Role::StateDirector,
            Role::CityDirector,
            Role::President,
        ]
    }

    pub fn is_director(&self) -> bool {
        matches!(self, Role::StateDirector | Role::CityDirector)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown role '{s}'")))
    }
}

/// Role a member holds inside one chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChapterRole {
    President,
    VicePresident,
    Secretary,
    Member,
}

impl ChapterRole {
    /// Map a public role name accepted by "assign chapter role" onto the
    /// chapter-local role. `USER` is the public name of `MEMBER`.
    pub fn from_assignable(role: Role) -> Option<ChapterRole> {
        match role {
            Role::VicePresident => Some(ChapterRole::VicePresident),
            Role::Secretary => Some(ChapterRole::Secretary),
            Role::User => Some(ChapterRole::Member),
            _ => None,
        }
    }

    /// Global role kept in sync with this chapter role.
    pub fn global_role(&self) -> Role {
        match self {
            ChapterRole::President => Role::President,
            ChapterRole::VicePresident => Role::VicePresident,
            ChapterRole::Secretary => Role::Secretary,
            ChapterRole::Member => Role::User,
        }
    }

    /// President, vice president or secretary.
    pub fn is_officer(&self) -> bool {
        !matches!(self, ChapterRole::Member)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterRole::President => "PRESIDENT",
            ChapterRole::VicePresident => "VICE_PRESIDENT",
            ChapterRole::Secretary => "SECRETARY",
            ChapterRole::Member => "MEMBER",
        }
    }
}

impl core::fmt::Display for ChapterRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
