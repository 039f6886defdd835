use serde::{Deserialize, Serialize};

use chapterhub_core::{CityId, Entity, StateId};

/// A state or union territory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub name: String,
    /// Short code, e.g. `"KA"`. Unique.
    pub code: String,
}

impl State {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: StateId::new(),
            name: name.into(),
            code: code.into(),
        }
    }
}

/// A city; always belongs to exactly one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub state_id: StateId,
}

impl City {
    pub fn new(name: impl Into<String>, state_id: StateId) -> Self {
        Self {
            id: CityId::new(),
            name: name.into(),
            state_id,
        }
    }
}

impl Entity for State {
    type Id = StateId;

    fn id(&self) -> StateId {
        self.id
    }
}

impl Entity for City {
    type Id = CityId;

    fn id(&self) -> CityId {
        self.id
    }
}
