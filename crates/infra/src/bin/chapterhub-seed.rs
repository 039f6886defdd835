use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use chapterhub_infra::config::AppConfig;
use chapterhub_infra::seed::{CitySeed, seed_all};
use chapterhub_infra::store::{InMemoryStore, Store, StoreError};

/// Usage: `chapterhub-seed [cities.json]`, where the file holds
/// `[{"state_code": "KA", "name": "Bengaluru"}, ...]`.
fn main() -> anyhow::Result<()> {
    chapterhub_observability::init();

    let config = AppConfig::from_env();
    let cities: Vec<CitySeed> = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading city list {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing city list {path}"))?
        }
        None => Vec::new(),
    };

    let store = Arc::new(InMemoryStore::new());
    let report = seed_all(&store, &cities, &config.seed_admin_email, Utc::now())
        .context("seeding store")?;

    let states_total = store.read(|r| Ok::<_, StoreError>(r.states().len()))?;

    tracing::info!(
        states_created = report.states_created,
        cities_created = report.cities_created,
        cities_skipped = report.cities_skipped,
        admin_created = report.admin_created,
        admin_email = %config.seed_admin_email,
        states_total,
        "seed complete"
    );
    Ok(())
}
