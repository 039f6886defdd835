//! Chapter creation and deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chapterhub_auth::{Actor, can_create_chapter, can_delete_chapter};
use chapterhub_chapters::{AuditAction, Chapter, validate_name};
use chapterhub_core::{ChapterId, CityId, DomainError, Location, StateId};

use crate::audit;
use crate::mail::Mailer;
use crate::store::Store;

use super::roles::check_location_exists;
use super::{Lifecycle, LifecycleResult, chapter_or_not_found, forbidden};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChapter {
    pub name: String,
    pub description: Option<String>,
    pub state_id: StateId,
    pub city_id: CityId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteChapter {
    pub chapter_id: ChapterId,
    pub occurred_at: DateTime<Utc>,
}

impl<S: Store, M: Mailer> Lifecycle<S, M> {
    pub fn create_chapter(&self, actor: &Actor, cmd: CreateChapter) -> LifecycleResult<Chapter> {
        let name = validate_name(&cmd.name)?;
        if !can_create_chapter(actor, cmd.state_id, cmd.city_id) {
            return Err(forbidden(
                actor,
                "create_chapter",
                "no jurisdiction over this location",
            ));
        }
        let now = cmd.occurred_at;

        let chapter = self.store().transaction(|tx| -> LifecycleResult<_> {
            check_location_exists(&*tx, &Location::city(cmd.state_id, cmd.city_id))?;
            if tx.chapter_by_name(&name, cmd.city_id).is_some() {
                return Err(DomainError::conflict(format!(
                    "a chapter named '{name}' already exists in this city"
                ))
                .into());
            }

            let chapter = Chapter::create(
                ChapterId::new(),
                &name,
                cmd.description.clone(),
                cmd.state_id,
                cmd.city_id,
                now,
            )?;
            tx.insert_chapter(chapter.clone())?;
            audit::record(
                tx,
                AuditAction::ChapterCreated,
                actor.user_id,
                Some(chapter.id.to_string()),
                Some(json!({
                    "name": chapter.name,
                    "stateId": chapter.state_id,
                    "cityId": chapter.city_id,
                })),
                now,
            )?;
            Ok(chapter)
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            chapter_id = %chapter.id,
            name = %chapter.name,
            "chapter created"
        );
        Ok(chapter)
    }

    /// Delete a chapter; memberships and join requests go with it, user and
    /// event pointers to it are cleared.
    pub fn delete_chapter(&self, actor: &Actor, cmd: DeleteChapter) -> LifecycleResult<()> {
        let now = cmd.occurred_at;
        let name = self.store().transaction(|tx| -> LifecycleResult<_> {
            let chapter = chapter_or_not_found(&*tx, cmd.chapter_id)?;
            if !can_delete_chapter(actor, &chapter.as_target()) {
                return Err(forbidden(
                    actor,
                    "delete_chapter",
                    "no jurisdiction over this chapter",
                ));
            }

            tx.delete_chapter(chapter.id)?;
            audit::record(
                tx,
                AuditAction::ChapterDeleted,
                actor.user_id,
                Some(chapter.id.to_string()),
                Some(json!({ "name": chapter.name })),
                now,
            )?;
            Ok(chapter.name)
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            chapter_id = %cmd.chapter_id,
            name = %name,
            "chapter deleted"
        );
        Ok(())
    }
}
