//! Join requests: submitted by users, reviewed by the chapter president.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chapterhub_auth::{Actor, can_review_join_requests};
use chapterhub_chapters::{AuditAction, JoinDecision, JoinRequest};
use chapterhub_core::{ChapterId, DomainError, JoinRequestId};

use crate::audit;
use crate::mail::Mailer;
use crate::store::Store;

use super::membership::enroll;
use super::{Lifecycle, LifecycleResult, chapter_or_not_found, forbidden};

const MAX_MESSAGE_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitJoinRequest {
    pub chapter_id: ChapterId,
    pub message: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessJoinRequest {
    pub request_id: JoinRequestId,
    pub decision: JoinDecision,
    pub occurred_at: DateTime<Utc>,
}

impl<S: Store, M: Mailer> Lifecycle<S, M> {
    /// The actor asks to join a chapter.
    pub fn submit_join_request(
        &self,
        actor: &Actor,
        cmd: SubmitJoinRequest,
    ) -> LifecycleResult<JoinRequest> {
        let message = cmd
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        if message.as_ref().is_some_and(|m| m.chars().count() > MAX_MESSAGE_LEN) {
            return Err(DomainError::validation(format!(
                "message must be at most {MAX_MESSAGE_LEN} characters"
            ))
            .into());
        }

        let request = self.store().transaction(|tx| -> LifecycleResult<_> {
            let chapter = chapter_or_not_found(&*tx, cmd.chapter_id)?;
            if !chapter.is_active() {
                return Err(DomainError::validation("chapter is not accepting members").into());
            }
            if tx.membership(cmd.chapter_id, actor.user_id).is_some() {
                return Err(DomainError::conflict("already a member of this chapter").into());
            }
            if tx
                .pending_join_request(cmd.chapter_id, actor.user_id)
                .is_some()
            {
                return Err(DomainError::conflict("a request is already pending").into());
            }

            let request = JoinRequest::submit(cmd.chapter_id, actor.user_id, message, cmd.occurred_at);
            tx.insert_join_request(request.clone())?;
            Ok(request)
        })?;

        tracing::info!(
            user_id = %actor.user_id,
            chapter_id = %cmd.chapter_id,
            request_id = %request.id,
            "join request submitted"
        );
        Ok(request)
    }

    /// Approve or reject a pending request. Processed requests are terminal.
    pub fn process_join_request(
        &self,
        actor: &Actor,
        cmd: ProcessJoinRequest,
    ) -> LifecycleResult<JoinRequest> {
        let now = cmd.occurred_at;
        let (request, invitations) = self.store().transaction(|tx| -> LifecycleResult<_> {
            let mut request = tx
                .join_request(cmd.request_id)
                .ok_or(DomainError::NotFound)?;
            let chapter = chapter_or_not_found(&*tx, request.chapter_id)?;
            if !can_review_join_requests(actor, &chapter.as_target()) {
                return Err(forbidden(
                    actor,
                    "process_join_request",
                    "only the chapter's president reviews join requests",
                ));
            }

            request.review(cmd.decision, actor.user_id, now)?;
            tx.update_join_request(request.clone())?;

            let mut invitations = Vec::new();
            let action = match cmd.decision {
                JoinDecision::Approve => {
                    let memberships = tx.user_memberships(request.user_id);
                    if memberships.iter().any(|m| m.chapter_id != request.chapter_id) {
                        return Err(DomainError::conflict(
                            "user already belongs to another chapter",
                        )
                        .into());
                    }
                    if memberships.is_empty() {
                        invitations =
                            enroll(tx, request.chapter_id, request.user_id, now)?.invitations;
                    }
                    AuditAction::JoinRequestApproved
                }
                JoinDecision::Reject => AuditAction::JoinRequestRejected,
            };

            audit::record(
                tx,
                action,
                actor.user_id,
                Some(request.user_id.to_string()),
                Some(json!({
                    "chapterId": request.chapter_id,
                    "requestId": request.id,
                })),
                now,
            )?;
            Ok((request, invitations))
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            request_id = %request.id,
            chapter_id = %request.chapter_id,
            decision = ?cmd.decision,
            "join request processed"
        );
        self.invites().dispatch(invitations);
        Ok(request)
    }
}
