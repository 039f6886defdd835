//! Location value (state + city) shared by users, chapters and actors.

use serde::{Deserialize, Serialize};

use crate::id::{CityId, StateId};

/// A possibly-partial position in the state → city hierarchy.
///
/// Equality is by value. A location with `state_id == None` never falls inside
/// any director's jurisdiction.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

impl Location {
    pub fn new(state_id: Option<StateId>, city_id: Option<CityId>) -> Self {
        Self { state_id, city_id }
    }

    pub fn city(state_id: StateId, city_id: CityId) -> Self {
        Self {
            state_id: Some(state_id),
            city_id: Some(city_id),
        }
    }

    pub fn state(state_id: StateId) -> Self {
        Self {
            state_id: Some(state_id),
            city_id: None,
        }
    }

    /// Both parts present.
    pub fn is_complete(&self) -> bool {
        self.state_id.is_some() && self.city_id.is_some()
    }

    /// Same state, where both sides actually have one.
    pub fn same_state(&self, other: &Location) -> bool {
        matches!((self.state_id, other.state_id), (Some(a), Some(b)) if a == b)
    }

    /// Same city, where both sides actually have one.
    pub fn same_city(&self, other: &Location) -> bool {
        matches!((self.city_id, other.city_id), (Some(a), Some(b)) if a == b)
    }
}
