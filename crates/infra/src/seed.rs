//! Reference data and the bootstrap administrator.
//!
//! Every function here is idempotent: states are keyed by code, cities by
//! (state, name) and the administrator by email.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chapterhub_auth::{Role, User};
use chapterhub_chapters::{City, State};
use chapterhub_core::{Location, UserId};

use crate::lifecycle::{LifecycleError, LifecycleResult};
use crate::store::Store;

/// Indian states followed by union territories, as (name, code).
pub const INDIAN_STATES: [(&str, &str); 36] = [
    ("Andhra Pradesh", "AP"),
    ("Arunachal Pradesh", "AR"),
    ("Assam", "AS"),
    ("Bihar", "BR"),
    ("Chhattisgarh", "CG"),
    ("Goa", "GA"),
    ("Gujarat", "GJ"),
    ("Haryana", "HR"),
    ("Himachal Pradesh", "HP"),
    ("Jharkhand", "JH"),
    ("Karnataka", "KA"),
    ("Kerala", "KL"),
    ("Madhya Pradesh", "MP"),
    ("Maharashtra", "MH"),
    ("Manipur", "MN"),
    ("Meghalaya", "ML"),
    ("Mizoram", "MZ"),
    ("Nagaland", "NL"),
    ("Odisha", "OR"),
    ("Punjab", "PB"),
    ("Rajasthan", "RJ"),
    ("Sikkim", "SK"),
    ("Tamil Nadu", "TN"),
    ("Telangana", "TG"),
    ("Tripura", "TR"),
    ("Uttar Pradesh", "UP"),
    ("Uttarakhand", "UK"),
    ("West Bengal", "WB"),
    ("Andaman and Nicobar Islands", "AN"),
    ("Chandigarh", "CH"),
    ("Dadra and Nagar Haveli and Daman and Diu", "DH"),
    ("Delhi", "DL"),
    ("Jammu and Kashmir", "JK"),
    ("Ladakh", "LA"),
    ("Lakshadweep", "LD"),
    ("Puducherry", "PY"),
];

/// A city to seed, addressed by its state's code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitySeed {
    pub state_code: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub states_created: usize,
    pub cities_created: usize,
    /// Cities whose state code is unknown.
    pub cities_skipped: usize,
    pub admin_created: bool,
}

pub fn seed_states<S: Store>(store: &S) -> LifecycleResult<usize> {
    store.transaction(|tx| -> LifecycleResult<_> {
        let mut created = 0;
        for (name, code) in INDIAN_STATES {
            if tx.state_by_code(code).is_none() {
                tx.insert_state(State::new(name, code))?;
                created += 1;
            }
        }
        Ok(created)
    })
}

/// Returns (created, skipped).
pub fn seed_cities<S: Store>(store: &S, cities: &[CitySeed]) -> LifecycleResult<(usize, usize)> {
    store.transaction(|tx| -> LifecycleResult<_> {
        let (mut created, mut skipped) = (0, 0);
        for seed in cities {
            let Some(state) = tx.state_by_code(seed.state_code.trim()) else {
                skipped += 1;
                continue;
            };
            let name = seed.name.trim();
            let exists = tx
                .cities_in(state.id)
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(name));
            if !exists {
                tx.insert_city(City::new(name, state.id))?;
                created += 1;
            }
        }
        Ok((created, skipped))
    })
}

/// Create the SUPER_ADMIN, or restore an existing account with that email to
/// an active, verified SUPER_ADMIN. Returns whether a new account was created.
pub fn seed_super_admin<S: Store>(
    store: &S,
    email: &str,
    now: DateTime<Utc>,
) -> LifecycleResult<bool> {
    let mut admin = User::register(
        UserId::new(),
        email,
        "Super",
        "Admin",
        Location::default(),
        now,
    )?;
    store.transaction(|tx| -> LifecycleResult<_> {
        if let Some(mut existing) = tx.user_by_email(&admin.email) {
            existing.role = Role::SuperAdmin;
            existing.is_active = true;
            existing.is_verified = true;
            existing.updated_at = now;
            tx.update_user(existing)?;
            return Ok(false);
        }
        admin.role = Role::SuperAdmin;
        admin.is_verified = true;
        tx.insert_user(admin)?;
        Ok(true)
    })
}

pub fn seed_all<S: Store>(
    store: &S,
    cities: &[CitySeed],
    admin_email: &str,
    now: DateTime<Utc>,
) -> Result<SeedReport, LifecycleError> {
    let states_created = seed_states(store)?;
    let (cities_created, cities_skipped) = seed_cities(store, cities)?;
    let admin_created = seed_super_admin(store, admin_email, now)?;
    Ok(SeedReport {
        states_created,
        cities_created,
        cities_skipped,
        admin_created,
    })
}
