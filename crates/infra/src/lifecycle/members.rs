//! Manual membership management by chapter managers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chapterhub_auth::{Actor, Role, can_manage_members};
use chapterhub_chapters::{AuditAction, JoinDecision};
use chapterhub_core::{ChapterId, DomainError, MembershipId, UserId};

use crate::audit;
use crate::mail::Mailer;
use crate::store::Store;

use super::membership::{enroll, withdraw};
use super::{Lifecycle, LifecycleResult, chapter_or_not_found, forbidden, user_or_not_found};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMember {
    pub chapter_id: ChapterId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddMemberOutcome {
    Added { membership_id: MembershipId },
    /// The pair already existed; nothing was written.
    AlreadyMember { membership_id: MembershipId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMember {
    pub chapter_id: ChapterId,
    pub membership_id: MembershipId,
    pub occurred_at: DateTime<Utc>,
}

impl<S: Store, M: Mailer> Lifecycle<S, M> {
    /// Add a user to a chapter.
    ///
    /// A repeated call for the same pair reports `AlreadyMember`. A user who
    /// holds a membership elsewhere is a conflict; a chapter pointer with no
    /// membership row behind it is stale and gets overwritten.
    pub fn add_member(&self, actor: &Actor, cmd: AddMember) -> LifecycleResult<AddMemberOutcome> {
        let now = cmd.occurred_at;
        let (outcome, invitations) = self.store().transaction(|tx| -> LifecycleResult<_> {
            let chapter = chapter_or_not_found(&*tx, cmd.chapter_id)?;
            if !can_manage_members(actor, &chapter.as_target()) {
                return Err(forbidden(
                    actor,
                    "add_member",
                    "no authority over this chapter's members",
                ));
            }
            let user = user_or_not_found(&*tx, cmd.user_id)?;

            if let Some(existing) = tx.membership(cmd.chapter_id, cmd.user_id) {
                return Ok((
                    AddMemberOutcome::AlreadyMember {
                        membership_id: existing.id,
                    },
                    Vec::new(),
                ));
            }
            if !tx.user_memberships(cmd.user_id).is_empty() {
                return Err(DomainError::conflict("user already belongs to another chapter").into());
            }
            if let Some(stale) = user.chapter_id {
                tracing::debug!(
                    user_id = %user.id,
                    stale_chapter_id = %stale,
                    "replacing stale chapter pointer"
                );
            }

            let enrollment = enroll(tx, cmd.chapter_id, cmd.user_id, now)?;

            if let Some(mut request) = tx.pending_join_request(cmd.chapter_id, cmd.user_id) {
                request.review(JoinDecision::Approve, actor.user_id, now)?;
                tx.update_join_request(request)?;
            }

            audit::record(
                tx,
                AuditAction::MemberAdded,
                actor.user_id,
                Some(cmd.user_id.to_string()),
                Some(json!({
                    "chapterId": cmd.chapter_id,
                    "membershipId": enrollment.membership.id,
                })),
                now,
            )?;
            Ok((
                AddMemberOutcome::Added {
                    membership_id: enrollment.membership.id,
                },
                enrollment.invitations,
            ))
        })?;

        if let AddMemberOutcome::Added { membership_id } = outcome {
            tracing::info!(
                actor_id = %actor.user_id,
                chapter_id = %cmd.chapter_id,
                user_id = %cmd.user_id,
                membership_id = %membership_id,
                "member added"
            );
        }
        self.invites().dispatch(invitations);
        Ok(outcome)
    }

    /// Remove a membership. The sitting president must be replaced first.
    pub fn remove_member(&self, actor: &Actor, cmd: RemoveMember) -> LifecycleResult<()> {
        let now = cmd.occurred_at;
        let user_id = self.store().transaction(|tx| -> LifecycleResult<_> {
            let chapter = chapter_or_not_found(&*tx, cmd.chapter_id)?;
            if !can_manage_members(actor, &chapter.as_target()) {
                return Err(forbidden(
                    actor,
                    "remove_member",
                    "no authority over this chapter's members",
                ));
            }
            let membership = tx
                .membership_by_id(cmd.membership_id)
                .filter(|m| m.chapter_id == cmd.chapter_id)
                .ok_or(DomainError::NotFound)?;

            if chapter.president_id == Some(membership.user_id) || membership.is_president() {
                return Err(DomainError::conflict(
                    "assign a new president before removing the current one",
                )
                .into());
            }

            withdraw(tx, &membership, now)?;

            if let Some(mut user) = tx.user(membership.user_id) {
                if matches!(user.role, Role::VicePresident | Role::Secretary) {
                    user.role = Role::User;
                    user.updated_at = now;
                    tx.update_user(user)?;
                }
            }

            audit::record(
                tx,
                AuditAction::MemberRemoved,
                actor.user_id,
                Some(membership.user_id.to_string()),
                Some(json!({
                    "chapterId": cmd.chapter_id,
                    "membershipId": membership.id,
                })),
                now,
            )?;
            Ok(membership.user_id)
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            chapter_id = %cmd.chapter_id,
            user_id = %user_id,
            "member removed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use chapterhub_auth::ChapterRole;
    use chapterhub_chapters::{AttendeeStatus, JoinRequest, JoinRequestStatus, PaymentStatus};
    use chapterhub_core::Location;

    use super::*;
    use crate::lifecycle::testkit::World;
    use crate::store::{StoreError, Window};

    fn add(w: &World, chapter_id: ChapterId, user_id: UserId) -> AddMember {
        AddMember {
            chapter_id,
            user_id,
            occurred_at: w.now,
        }
    }

    #[test]
    fn add_member_enrolls_and_invites_to_upcoming_events_only() {
        let w = World::new();
        let chapter = w.chapter("Indiranagar");
        let upcoming = w.event(&chapter, Duration::days(3));
        let past = w.event(&chapter, -Duration::days(3));
        let user = w.user(Role::User, w.here());
        let director = World::actor(&w.user(Role::CityDirector, w.here()));

        let outcome = w
            .lifecycle
            .add_member(&director, add(&w, chapter.id, user.id))
            .unwrap();
        assert!(matches!(outcome, AddMemberOutcome::Added { .. }));

        w.read(|r| {
            assert_eq!(r.user(user.id).unwrap().chapter_id, Some(chapter.id));
            let attendee = r.attendee_for(upcoming.id, user.id).unwrap();
            assert_eq!(attendee.status, AttendeeStatus::Invited);
            assert_eq!(attendee.payment_status, PaymentStatus::Pending);
            assert!(r.attendee_for(past.id, user.id).is_none());
            assert_eq!(
                r.audit_entries(Window::ALL)[0].action,
                AuditAction::MemberAdded
            );
        });
        let sent = w.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, vec![user.email.clone()]);
        assert_eq!(sent[0].1.title, upcoming.title);
    }

    #[test]
    fn second_add_is_a_no_op() {
        let w = World::new();
        let chapter = w.chapter("Koramangala");
        let user = w.user(Role::User, w.here());
        let admin = w.super_admin();

        let first = w
            .lifecycle
            .add_member(&admin, add(&w, chapter.id, user.id))
            .unwrap();
        let audits = w.audit_count();
        let second = w
            .lifecycle
            .add_member(&admin, add(&w, chapter.id, user.id))
            .unwrap();

        let AddMemberOutcome::Added { membership_id } = first else {
            panic!("first add should insert");
        };
        assert_eq!(second, AddMemberOutcome::AlreadyMember { membership_id });
        assert_eq!(w.audit_count(), audits);
        assert_eq!(w.read(|r| r.chapter_members(chapter.id).len()), 1);
    }

    #[test]
    fn stale_pointer_is_self_healed() {
        let w = World::new();
        let stale_chapter = w.chapter("Old Chapter");
        let chapter = w.chapter("New Chapter");
        let user = w.user(Role::User, w.here());
        w.store
            .transaction(|tx| {
                let mut u = tx.user(user.id).unwrap();
                u.chapter_id = Some(stale_chapter.id);
                tx.update_user(u)
            })
            .map_err(|e: StoreError| e)
            .unwrap();

        let outcome = w
            .lifecycle
            .add_member(&w.super_admin(), add(&w, chapter.id, user.id))
            .unwrap();

        assert!(matches!(outcome, AddMemberOutcome::Added { .. }));
        assert_eq!(
            w.read(|r| r.user(user.id).unwrap().chapter_id),
            Some(chapter.id)
        );
    }

    #[test]
    fn member_of_another_chapter_conflicts() {
        let w = World::new();
        let a = w.chapter("Chapter A");
        let b = w.chapter("Chapter B");
        let user = w.user(Role::User, w.here());
        w.member(&a, &user, ChapterRole::Member);

        let err = w
            .lifecycle
            .add_member(&w.super_admin(), add(&w, b.id, user.id))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn add_member_approves_pending_request() {
        let w = World::new();
        let chapter = w.chapter("Jayanagar");
        let president = World::actor(&w.president(&chapter));
        let user = w.user(Role::User, w.here());
        let request = JoinRequest::submit(chapter.id, user.id, None, w.now);
        w.store
            .transaction(|tx| tx.insert_join_request(request.clone()))
            .map_err(|e: StoreError| e)
            .unwrap();

        w.lifecycle
            .add_member(&president, add(&w, chapter.id, user.id))
            .unwrap();

        let stored = w.read(|r| r.join_request(request.id).unwrap());
        assert_eq!(stored.status, JoinRequestStatus::Approved);
        assert_eq!(stored.reviewed_by, Some(president.user_id));
    }

    #[test]
    fn president_of_other_chapter_cannot_add() {
        let w = World::new();
        let chapter = w.chapter("Whitefield");
        let other = w.chapter("Hebbal");
        let other_president = World::actor(&w.president(&other));
        let user = w.user(Role::User, w.here());

        let err = w
            .lifecycle
            .add_member(&other_president, add(&w, chapter.id, user.id))
            .unwrap_err();
        assert!(err.is_forbidden());
    }

    #[test]
    fn mail_failure_does_not_fail_the_add() {
        let w = World::new();
        let chapter = w.chapter("Malleshwaram");
        w.event(&chapter, Duration::days(1));
        let user = w.user(Role::User, w.here());
        w.mailer.fail_sends(true);

        w.lifecycle
            .add_member(&w.super_admin(), add(&w, chapter.id, user.id))
            .unwrap();
        assert!(w.read(|r| r.membership(chapter.id, user.id)).is_some());
        assert!(w.mailer.sent().is_empty());
    }

    #[test]
    fn audit_failure_rolls_back_the_add() {
        let w = World::new();
        let chapter = w.chapter("Yelahanka");
        w.event(&chapter, Duration::days(1));
        let user = w.user(Role::User, w.here());
        let admin = w.super_admin();
        w.store.fail_audit_writes(true);

        let err = w
            .lifecycle
            .add_member(&admin, add(&w, chapter.id, user.id))
            .unwrap_err();
        assert!(matches!(err, crate::lifecycle::LifecycleError::Store(StoreError::AuditWrite(_))));
        w.read(|r| {
            assert!(r.membership(chapter.id, user.id).is_none());
            assert_eq!(r.user(user.id).unwrap().chapter_id, None);
        });
        assert!(w.mailer.sent().is_empty());
    }

    #[test]
    fn removing_the_president_conflicts_and_changes_nothing() {
        let w = World::new();
        let chapter = w.chapter("Basavanagudi");
        let president = w.president(&chapter);
        let membership = w.read(|r| r.membership(chapter.id, president.id).unwrap());
        let audits = w.audit_count();

        let err = w
            .lifecycle
            .remove_member(
                &w.super_admin(),
                RemoveMember {
                    chapter_id: chapter.id,
                    membership_id: membership.id,
                    occurred_at: w.now,
                },
            )
            .unwrap_err();

        assert!(err.is_conflict());
        w.read(|r| {
            assert!(r.membership_by_id(membership.id).is_some());
            assert_eq!(r.chapter(chapter.id).unwrap().president_id, Some(president.id));
            assert_eq!(r.user(president.id).unwrap().role, Role::President);
        });
        assert_eq!(w.audit_count(), audits);
    }

    #[test]
    fn removing_an_officer_resets_role_and_future_attendance() {
        let w = World::new();
        let chapter = w.chapter("Sadashivanagar");
        let president = World::actor(&w.president(&chapter));
        let vp = w.user(Role::VicePresident, w.here());
        let membership = w.member(&chapter, &vp, ChapterRole::VicePresident);
        let upcoming = w.event(&chapter, Duration::days(2));
        let past = w.event(&chapter, -Duration::days(2));
        w.store
            .transaction(|tx| {
                tx.insert_attendee(chapterhub_chapters::EventAttendee::invite(upcoming.id, vp.id, w.now))?;
                tx.insert_attendee(chapterhub_chapters::EventAttendee::invite(past.id, vp.id, w.now))
            })
            .map_err(|e: StoreError| e)
            .unwrap();

        w.lifecycle
            .remove_member(
                &president,
                RemoveMember {
                    chapter_id: chapter.id,
                    membership_id: membership.id,
                    occurred_at: w.now,
                },
            )
            .unwrap();

        w.read(|r| {
            let user = r.user(vp.id).unwrap();
            assert_eq!(user.role, Role::User);
            assert_eq!(user.chapter_id, None);
            assert!(r.membership_by_id(membership.id).is_none());
            assert!(r.attendee_for(upcoming.id, vp.id).is_none());
            assert!(r.attendee_for(past.id, vp.id).is_some());
        });
    }

    #[test]
    fn membership_of_another_chapter_is_not_found() {
        let w = World::new();
        let a = w.chapter_at("Chapter A", Location::city(w.state.id, w.city.id));
        let b = w.chapter("Chapter B");
        let user = w.user(Role::User, w.here());
        let membership = w.member(&b, &user, ChapterRole::Member);

        let err = w
            .lifecycle
            .remove_member(
                &w.super_admin(),
                RemoveMember {
                    chapter_id: a.id,
                    membership_id: membership.id,
                    occurred_at: w.now,
                },
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
