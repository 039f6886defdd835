use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chapterhub_auth::ChapterRole;
use chapterhub_core::{ChapterId, Entity, MembershipId, UserId};

/// Membership of one user in one chapter. `(chapter_id, user_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMember {
    pub id: MembershipId,
    pub chapter_id: ChapterId,
    pub user_id: UserId,
    pub role: ChapterRole,
    pub joined_at: DateTime<Utc>,
}

impl ChapterMember {
    /// A plain `MEMBER` row.
    pub fn join(chapter_id: ChapterId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: MembershipId::new(),
            chapter_id,
            user_id,
            role: ChapterRole::Member,
            joined_at: now,
        }
    }

    pub fn is_president(&self) -> bool {
        self.role == ChapterRole::President
    }
}

impl Entity for ChapterMember {
    type Id = MembershipId;

    fn id(&self) -> MembershipId {
        self.id
    }
}
