use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chapterhub_core::{ChapterId, DomainError, Entity, JoinRequestId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinDecision {
    Approve,
    Reject,
}

/// A user's request to join a chapter.
///
/// # Invariants
/// - `APPROVED` and `REJECTED` are terminal.
/// - `reviewed_by`/`reviewed_at` are set exactly when the request left `PENDING`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: JoinRequestId,
    pub chapter_id: ChapterId,
    pub user_id: UserId,
    pub status: JoinRequestStatus,
    pub message: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JoinRequest {
    pub fn submit(
        chapter_id: ChapterId,
        user_id: UserId,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JoinRequestId::new(),
            chapter_id,
            user_id,
            status: JoinRequestStatus::Pending,
            message: message.filter(|m| !m.trim().is_empty()),
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == JoinRequestStatus::Pending
    }

    /// Move a pending request to its terminal state.
    pub fn review(
        &mut self,
        decision: JoinDecision,
        reviewer: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(DomainError::conflict("join request has already been processed"));
        }
        self.status = match decision {
            JoinDecision::Approve => JoinRequestStatus::Approved,
            JoinDecision::Reject => JoinRequestStatus::Rejected,
        };
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        Ok(())
    }
}

impl Entity for JoinRequest {
    type Id = JoinRequestId;

    fn id(&self) -> JoinRequestId {
        self.id
    }
}
