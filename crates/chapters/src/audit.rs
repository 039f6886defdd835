use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chapterhub_core::{AuditId, Entity, UserId};

/// Privileged mutation kinds recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ChapterCreated,
    ChapterDeleted,
    PresidentAssigned,
    ChapterRoleAssigned,
    MemberAdded,
    MemberRemoved,
    JoinRequestApproved,
    JoinRequestRejected,
    MeetingCreated,
    EventDeleted,
    AttendeeRemoved,
    RoleAssigned,
    UserVerified,
    UserUnverified,
    UserDeactivated,
    UserActivated,
    LocationUpdated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ChapterCreated => "CHAPTER_CREATED",
            AuditAction::ChapterDeleted => "CHAPTER_DELETED",
            AuditAction::PresidentAssigned => "PRESIDENT_ASSIGNED",
            AuditAction::ChapterRoleAssigned => "CHAPTER_ROLE_ASSIGNED",
            AuditAction::MemberAdded => "MEMBER_ADDED",
            AuditAction::MemberRemoved => "MEMBER_REMOVED",
            AuditAction::JoinRequestApproved => "JOIN_REQUEST_APPROVED",
            AuditAction::JoinRequestRejected => "JOIN_REQUEST_REJECTED",
            AuditAction::MeetingCreated => "MEETING_CREATED",
            AuditAction::EventDeleted => "EVENT_DELETED",
            AuditAction::AttendeeRemoved => "ATTENDEE_REMOVED",
            AuditAction::RoleAssigned => "ROLE_ASSIGNED",
            AuditAction::UserVerified => "USER_VERIFIED",
            AuditAction::UserUnverified => "USER_UNVERIFIED",
            AuditAction::UserDeactivated => "USER_DEACTIVATED",
            AuditAction::UserActivated => "USER_ACTIVATED",
            AuditAction::LocationUpdated => "LOCATION_UPDATED",
        }
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit row. Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub action: AuditAction,
    pub performer_id: UserId,
    /// Id of the affected record (user, chapter, event, ...), if any.
    pub target_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        performer_id: UserId,
        target_id: Option<String>,
        details: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditId::new(),
            action,
            performer_id,
            target_id,
            details,
            created_at: now,
        }
    }
}

impl Entity for AuditEntry {
    type Id = AuditId;

    fn id(&self) -> AuditId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_match_serde() {
        for action in [AuditAction::RoleAssigned, AuditAction::JoinRequestApproved] {
            let json = serde_json::to_value(action).unwrap();
            assert_eq!(json, serde_json::Value::String(action.as_str().to_string()));
        }
    }
}
