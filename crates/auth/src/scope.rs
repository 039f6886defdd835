//! Row-level scoping.
//!
//! A [`ScopeFilter`] is computed once per actor and resource family and then
//! applied to every row a query touches. Filters are conservative: a missing
//! anchor on the actor yields [`ScopeFilter::MatchNothing`], never a wider scan.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chapterhub_core::{CityId, StateId, UserId};

use crate::{Actor, Role};

/// Fields a scope filter may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeFields {
    pub id: Uuid,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub president_id: Option<UserId>,
}

/// Rows that can be checked against a [`ScopeFilter`].
pub trait Scoped {
    fn scope_fields(&self) -> ScopeFields;
}

/// Predicate restricting a query to rows within an actor's jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScopeFilter {
    Unrestricted,
    State { state_id: StateId },
    City { state_id: StateId, city_id: CityId },
    PresidedBy { president_id: UserId },
    SelfOnly { user_id: UserId },
    MatchNothing,
}

impl ScopeFilter {
    pub fn matches(&self, row: &ScopeFields) -> bool {
        match *self {
            ScopeFilter::Unrestricted => true,
            ScopeFilter::State { state_id } => row.state_id == Some(state_id),
            ScopeFilter::City { state_id, city_id } => {
                row.state_id == Some(state_id) && row.city_id == Some(city_id)
            }
            ScopeFilter::PresidedBy { president_id } => row.president_id == Some(president_id),
            ScopeFilter::SelfOnly { user_id } => row.id == *user_id.as_uuid(),
            ScopeFilter::MatchNothing => false,
        }
    }

    pub fn admits<T: Scoped + ?Sized>(&self, row: &T) -> bool {
        self.matches(&row.scope_fields())
    }
}

fn director_filter(actor: &Actor) -> ScopeFilter {
    match (actor.role, actor.state_id, actor.city_id) {
        (Role::StateDirector, Some(state_id), _) => ScopeFilter::State { state_id },
        (Role::CityDirector, Some(state_id), Some(city_id)) => {
            ScopeFilter::City { state_id, city_id }
        }
        _ => ScopeFilter::MatchNothing,
    }
}

/// Scope over user records.
pub fn user_scope(actor: &Actor) -> ScopeFilter {
    match actor.role {
        Role::SuperAdmin => ScopeFilter::Unrestricted,
        Role::StateDirector | Role::CityDirector => director_filter(actor),
        Role::President | Role::VicePresident | Role::Secretary | Role::User => {
            ScopeFilter::SelfOnly {
                user_id: actor.user_id,
            }
        }
    }
}

/// Scope over chapter records.
pub fn chapter_scope(actor: &Actor) -> ScopeFilter {
    match actor.role {
        Role::SuperAdmin => ScopeFilter::Unrestricted,
        Role::StateDirector | Role::CityDirector => director_filter(actor),
        Role::President => ScopeFilter::PresidedBy {
            president_id: actor.user_id,
        },
        Role::VicePresident | Role::Secretary | Role::User => ScopeFilter::MatchNothing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapterhub_core::Location;
    use proptest::prelude::*;

    /// Jurisdiction as a reader would state it, independent of the filter
    /// representation.
    fn user_in_jurisdiction(actor: &Actor, row: &ScopeFields) -> bool {
        match actor.role {
            Role::SuperAdmin => true,
            Role::StateDirector => actor.state_id.is_some() && row.state_id == actor.state_id,
            Role::CityDirector => {
                actor.state_id.is_some()
                    && actor.city_id.is_some()
                    && row.state_id == actor.state_id
                    && row.city_id == actor.city_id
            }
            _ => row.id == *actor.user_id.as_uuid(),
        }
    }

    fn chapter_in_jurisdiction(actor: &Actor, row: &ScopeFields) -> bool {
        match actor.role {
            Role::President => row.president_id == Some(actor.user_id),
            Role::VicePresident | Role::Secretary | Role::User => false,
            _ => user_in_jurisdiction(actor, row),
        }
    }

    // Small id pools so that generated actors and rows actually collide.
    fn pools() -> (Vec<StateId>, Vec<CityId>, Vec<UserId>) {
        (
            (0..3).map(|_| StateId::new()).collect(),
            (0..3).map(|_| CityId::new()).collect(),
            (0..4).map(|_| UserId::new()).collect(),
        )
    }

    fn pick<T: Copy>(pool: &[T], idx: Option<usize>) -> Option<T> {
        idx.map(|i| pool[i % pool.len()])
    }

    fn arb_role() -> impl Strategy<Value = Role> {
        (0usize..7).prop_map(|i| Role::ALL[i])
    }

    type Slots = (Option<usize>, Option<usize>, Option<usize>);

    fn arb_slots() -> impl Strategy<Value = Slots> {
        (
            proptest::option::of(0usize..3),
            proptest::option::of(0usize..3),
            proptest::option::of(0usize..4),
        )
    }

    #[test]
    fn missing_anchor_matches_nothing() {
        let actor = Actor::new(UserId::new(), Role::CityDirector, Location::state(StateId::new()));
        assert_eq!(user_scope(&actor), ScopeFilter::MatchNothing);
        assert_eq!(chapter_scope(&actor), ScopeFilter::MatchNothing);

        let actor = Actor::new(UserId::new(), Role::StateDirector, Location::default());
        assert_eq!(user_scope(&actor), ScopeFilter::MatchNothing);
    }

    #[test]
    fn president_sees_only_own_chapters_and_self() {
        let me = UserId::new();
        let actor = Actor::new(me, Role::President, Location::default());
        let mine = ScopeFields {
            id: Uuid::now_v7(),
            state_id: None,
            city_id: None,
            president_id: Some(me),
        };
        let theirs = ScopeFields {
            president_id: Some(UserId::new()),
            ..mine
        };
        assert!(chapter_scope(&actor).matches(&mine));
        assert!(!chapter_scope(&actor).matches(&theirs));
        assert_eq!(user_scope(&actor), ScopeFilter::SelfOnly { user_id: me });
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: filtering a table returns exactly the rows in jurisdiction.
        #[test]
        fn user_scope_is_sound_and_complete(
            role in arb_role(),
            actor_slots in arb_slots(),
            rows in proptest::collection::vec(arb_slots(), 0..24),
        ) {
            let (states, cities, users) = pools();
            let actor = Actor {
                user_id: pick(&users, actor_slots.2).unwrap_or(users[0]),
                role,
                state_id: pick(&states, actor_slots.0),
                city_id: pick(&cities, actor_slots.1),
            };
            let filter = user_scope(&actor);

            for (s, c, u) in rows {
                let row = ScopeFields {
                    id: *pick(&users, u).unwrap_or_else(UserId::new).as_uuid(),
                    state_id: pick(&states, s),
                    city_id: pick(&cities, c),
                    president_id: None,
                };
                prop_assert_eq!(filter.matches(&row), user_in_jurisdiction(&actor, &row));
            }
        }

        #[test]
        fn chapter_scope_is_sound_and_complete(
            role in arb_role(),
            actor_slots in arb_slots(),
            rows in proptest::collection::vec(arb_slots(), 0..24),
        ) {
            let (states, cities, users) = pools();
            let actor = Actor {
                user_id: pick(&users, actor_slots.2).unwrap_or(users[0]),
                role,
                state_id: pick(&states, actor_slots.0),
                city_id: pick(&cities, actor_slots.1),
            };
            let filter = chapter_scope(&actor);

            for (s, c, p) in rows {
                let row = ScopeFields {
                    id: Uuid::now_v7(),
                    state_id: pick(&states, s),
                    city_id: pick(&cities, c),
                    president_id: pick(&users, p),
                };
                prop_assert_eq!(filter.matches(&row), chapter_in_jurisdiction(&actor, &row));
            }
        }
    }
}
