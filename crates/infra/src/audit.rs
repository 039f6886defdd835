//! Audit sink helper.
//!
//! Audit rows are written inside the mutation's own transaction, so a failed
//! audit write aborts the mutation with it.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use chapterhub_chapters::{AuditAction, AuditEntry};
use chapterhub_core::UserId;

use crate::store::{StoreError, Transaction};

pub fn record(
    tx: &mut dyn Transaction,
    action: AuditAction,
    performer_id: UserId,
    target_id: Option<String>,
    details: Option<JsonValue>,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    tx.append_audit(AuditEntry::new(action, performer_id, target_id, details, now))
}
