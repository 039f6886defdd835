//! Chapter meetings, their attendees, and paid entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chapterhub_auth::{
    Actor, ChapterTarget, can_delete_event, can_remove_attendee, can_schedule_meeting,
};
use chapterhub_chapters::{
    AuditAction, Event, EventAttendee, EventType, Recurrence, validate_title,
};
use chapterhub_core::{AttendeeId, ChapterId, DomainError, EventId};

use crate::audit;
use crate::mail::{Invitation, Mailer};
use crate::store::{Store, StoreRead};

use super::{Lifecycle, LifecycleError, LifecycleResult, chapter_or_not_found, forbidden};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMeeting {
    pub chapter_id: ChapterId,
    pub title: String,
    pub description: String,
    pub venue: Option<String>,
    pub date: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
    pub entry_fee: u32,
    pub is_public: bool,
    /// Mail every member once the meeting is committed.
    pub send_invites: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEvent {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveAttendee {
    pub event_id: EventId,
    pub attendee_id: AttendeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPayment {
    pub event_id: EventId,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub occurred_at: DateTime<Utc>,
}

/// Chapter descriptor for an event, if it still belongs to one.
fn event_chapter<R>(r: &R, event: &Event) -> Option<ChapterTarget>
where
    R: StoreRead + ?Sized,
{
    event
        .chapter_id
        .and_then(|id| r.chapter(id))
        .map(|c| c.as_target())
}

impl<S: Store, M: Mailer> Lifecycle<S, M> {
    /// Schedule a meeting and put every current member on it.
    pub fn create_meeting(&self, actor: &Actor, cmd: CreateMeeting) -> LifecycleResult<Event> {
        let title = validate_title(&cmd.title)?;
        let now = cmd.occurred_at;

        let (event, invitations) = self.store().transaction(|tx| -> LifecycleResult<_> {
            let chapter = chapter_or_not_found(&*tx, cmd.chapter_id)?;
            let own_role = tx.membership(cmd.chapter_id, actor.user_id).map(|m| m.role);
            if !can_schedule_meeting(actor, &chapter.as_target(), own_role) {
                return Err(forbidden(
                    actor,
                    "create_meeting",
                    "not an officer of this chapter",
                ));
            }

            let event = Event {
                id: EventId::new(),
                title,
                description: cmd.description.trim().to_string(),
                event_type: EventType::Meeting,
                venue: cmd
                    .venue
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
                date: cmd.date,
                recurrence: cmd.recurrence,
                entry_fee: cmd.entry_fee,
                is_public: cmd.is_public,
                chapter_id: Some(cmd.chapter_id),
                creator_id: actor.user_id,
                created_at: now,
            };
            tx.insert_event(event.clone())?;

            let mut recipients = Vec::new();
            for member in tx.chapter_members(cmd.chapter_id) {
                if tx.attendee_for(event.id, member.user_id).is_some() {
                    continue;
                }
                tx.insert_attendee(EventAttendee::invite(event.id, member.user_id, now))?;
                if let Some(user) = tx.user(member.user_id) {
                    recipients.push(user.email);
                }
            }

            audit::record(
                tx,
                AuditAction::MeetingCreated,
                actor.user_id,
                Some(event.id.to_string()),
                Some(json!({
                    "chapterId": cmd.chapter_id,
                    "title": event.title,
                    "invited": recipients.len(),
                })),
                now,
            )?;

            let invitations = if cmd.send_invites {
                vec![Invitation {
                    event: event.clone(),
                    recipients,
                }]
            } else {
                Vec::new()
            };
            Ok((event, invitations))
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            chapter_id = %cmd.chapter_id,
            event_id = %event.id,
            "meeting created"
        );
        self.invites().dispatch(invitations);
        Ok(event)
    }

    pub fn delete_event(&self, actor: &Actor, cmd: DeleteEvent) -> LifecycleResult<()> {
        let now = cmd.occurred_at;
        self.store().transaction(|tx| -> LifecycleResult<_> {
            let event = tx.event(cmd.event_id).ok_or(DomainError::NotFound)?;
            let chapter = event_chapter(&*tx, &event);
            if !can_delete_event(actor, Some(event.creator_id), chapter.as_ref()) {
                return Err(forbidden(
                    actor,
                    "delete_event",
                    "only the creator or the chapter's president may delete",
                ));
            }

            tx.delete_event(event.id)?;
            audit::record(
                tx,
                AuditAction::EventDeleted,
                actor.user_id,
                Some(event.id.to_string()),
                Some(json!({
                    "title": event.title,
                    "chapterId": event.chapter_id,
                })),
                now,
            )?;
            Ok(())
        })?;

        tracing::info!(actor_id = %actor.user_id, event_id = %cmd.event_id, "event deleted");
        Ok(())
    }

    pub fn remove_attendee(&self, actor: &Actor, cmd: RemoveAttendee) -> LifecycleResult<()> {
        let now = cmd.occurred_at;
        self.store().transaction(|tx| -> LifecycleResult<_> {
            let event = tx.event(cmd.event_id).ok_or(DomainError::NotFound)?;
            let attendee = tx
                .attendee(cmd.attendee_id)
                .filter(|a| a.event_id == event.id)
                .ok_or(DomainError::NotFound)?;
            let chapter = event_chapter(&*tx, &event);
            if !can_remove_attendee(actor, Some(event.creator_id), chapter.as_ref()) {
                return Err(forbidden(
                    actor,
                    "remove_attendee",
                    "no authority over this event's attendees",
                ));
            }

            tx.delete_attendee(attendee.id)?;
            audit::record(
                tx,
                AuditAction::AttendeeRemoved,
                actor.user_id,
                Some(attendee.user_id.to_string()),
                Some(json!({
                    "eventId": event.id,
                    "attendeeId": attendee.id,
                })),
                now,
            )?;
            Ok(())
        })?;

        tracing::info!(
            actor_id = %actor.user_id,
            event_id = %cmd.event_id,
            attendee_id = %cmd.attendee_id,
            "attendee removed"
        );
        Ok(())
    }

    /// Check the gateway signature and mark the actor as paid and going.
    pub fn verify_payment(
        &self,
        actor: &Actor,
        cmd: VerifyPayment,
    ) -> LifecycleResult<EventAttendee> {
        if cmd.order_id.trim().is_empty()
            || cmd.payment_id.trim().is_empty()
            || cmd.signature.trim().is_empty()
        {
            return Err(DomainError::validation("order, payment and signature are required").into());
        }
        let verifier = self.payments.as_ref().ok_or_else(|| {
            LifecycleError::Configuration("PAYMENT_KEY_SECRET is not configured".to_string())
        })?;
        if verifier
            .verify(&cmd.order_id, &cmd.payment_id, &cmd.signature)
            .is_err()
        {
            tracing::warn!(
                user_id = %actor.user_id,
                event_id = %cmd.event_id,
                "payment signature mismatch"
            );
            return Err(DomainError::validation("invalid payment signature").into());
        }

        let now = cmd.occurred_at;
        let attendee = self.store().transaction(|tx| -> LifecycleResult<_> {
            let event = tx.event(cmd.event_id).ok_or(DomainError::NotFound)?;
            let attendee = match tx.attendee_for(event.id, actor.user_id) {
                Some(mut attendee) => {
                    attendee.mark_paid(cmd.payment_id.as_str(), event.entry_fee);
                    tx.update_attendee(attendee.clone())?;
                    attendee
                }
                None => {
                    let mut attendee = EventAttendee::invite(event.id, actor.user_id, now);
                    attendee.mark_paid(cmd.payment_id.as_str(), event.entry_fee);
                    tx.insert_attendee(attendee.clone())?;
                    attendee
                }
            };
            Ok(attendee)
        })?;

        tracing::info!(
            user_id = %actor.user_id,
            event_id = %cmd.event_id,
            amount = attendee.amount_paid,
            "payment verified"
        );
        Ok(attendee)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use chapterhub_auth::{ChapterRole, Role};
    use chapterhub_chapters::{AttendeeStatus, PaymentStatus};
    use chapterhub_core::Location;

    use super::*;
    use crate::config::AppConfig;
    use crate::lifecycle::testkit::{PAYMENT_SECRET, World};
    use crate::mail::RecordingMailer;
    use crate::payment::PaymentVerifier;
    use crate::store::{InMemoryStore, Window};

    fn meeting(w: &World, chapter_id: ChapterId, send_invites: bool) -> CreateMeeting {
        CreateMeeting {
            chapter_id,
            title: "  Monthly meet  ".to_string(),
            description: "Agenda".to_string(),
            venue: Some("  ".to_string()),
            date: w.now + Duration::days(7),
            recurrence: None,
            entry_fee: 0,
            is_public: true,
            send_invites,
            occurred_at: w.now,
        }
    }

    #[test]
    fn officer_schedules_and_members_are_invited() {
        let w = World::new();
        let chapter = w.chapter("Indiranagar");
        let secretary = w.user(Role::Secretary, w.here());
        w.member(&chapter, &secretary, ChapterRole::Secretary);
        let a = w.user(Role::User, w.here());
        let b = w.user(Role::User, w.here());
        w.member(&chapter, &a, ChapterRole::Member);
        w.member(&chapter, &b, ChapterRole::Member);

        let event = w
            .lifecycle
            .create_meeting(&World::actor(&secretary), meeting(&w, chapter.id, true))
            .unwrap();

        assert_eq!(event.title, "Monthly meet");
        assert_eq!(event.venue, None);
        assert_eq!(event.event_type, EventType::Meeting);
        w.read(|r| {
            let attendees = r.event_attendees(event.id);
            assert_eq!(attendees.len(), 3);
            assert!(attendees.iter().all(|a| a.status == AttendeeStatus::Invited));
            assert_eq!(
                r.audit_entries(Window::ALL)[0].action,
                AuditAction::MeetingCreated
            );
        });
        let sent = w.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.len(), 3);
        assert_eq!(sent[0].1.venue, "Online");
    }

    #[test]
    fn officer_of_another_chapter_is_forbidden() {
        let w = World::new();
        let chapter = w.chapter("Koramangala");
        let other = w.chapter("Hebbal");
        let vp = w.user(Role::VicePresident, w.here());
        w.member(&other, &vp, ChapterRole::VicePresident);

        let err = w
            .lifecycle
            .create_meeting(&World::actor(&vp), meeting(&w, chapter.id, false))
            .unwrap_err();
        assert!(err.is_forbidden());
    }

    #[test]
    fn director_schedules_without_mail() {
        let w = World::new();
        let chapter = w.chapter("Jayanagar");
        let member = w.user(Role::User, w.here());
        w.member(&chapter, &member, ChapterRole::Member);
        let director = World::actor(&w.user(Role::StateDirector, Location::state(w.state.id)));

        let event = w
            .lifecycle
            .create_meeting(&director, meeting(&w, chapter.id, false))
            .unwrap();
        assert!(w.read(|r| r.attendee_for(event.id, member.id)).is_some());
        assert!(w.mailer.sent().is_empty());
    }

    #[test]
    fn blank_title_is_rejected_first() {
        let w = World::new();
        let user = w.user(Role::User, w.here());
        let mut cmd = meeting(&w, ChapterId::new(), false);
        cmd.title = "   ".to_string();
        assert!(
            w.lifecycle
                .create_meeting(&World::actor(&user), cmd)
                .unwrap_err()
                .is_validation()
        );
    }

    #[test]
    fn delete_event_by_creator_or_president() {
        let w = World::new();
        let chapter = w.chapter("Whitefield");
        let president = World::actor(&w.president(&chapter));
        let member = w.user(Role::User, w.here());
        w.member(&chapter, &member, ChapterRole::Member);
        let event = w.event(&chapter, Duration::days(2));
        w.store
            .transaction(|tx| tx.insert_attendee(EventAttendee::invite(event.id, member.id, w.now)))
            .map_err(|e: crate::store::StoreError| e)
            .unwrap();

        let err = w
            .lifecycle
            .delete_event(
                &World::actor(&member),
                DeleteEvent {
                    event_id: event.id,
                    occurred_at: w.now,
                },
            )
            .unwrap_err();
        assert!(err.is_forbidden());

        w.lifecycle
            .delete_event(
                &president,
                DeleteEvent {
                    event_id: event.id,
                    occurred_at: w.now,
                },
            )
            .unwrap();
        w.read(|r| {
            assert!(r.event(event.id).is_none());
            assert!(r.event_attendees(event.id).is_empty());
        });
    }

    #[test]
    fn director_removes_attendee_of_covered_chapter() {
        let w = World::new();
        let chapter = w.chapter("Malleshwaram");
        let member = w.user(Role::User, w.here());
        let event = w.event(&chapter, Duration::days(2));
        let attendee = EventAttendee::invite(event.id, member.id, w.now);
        w.store
            .transaction(|tx| tx.insert_attendee(attendee.clone()))
            .map_err(|e: crate::store::StoreError| e)
            .unwrap();
        let elsewhere = World::actor(&w.user(
            Role::CityDirector,
            Location::city(w.state.id, w.other_city.id),
        ));
        let director = World::actor(&w.user(Role::CityDirector, w.here()));
        let cmd = RemoveAttendee {
            event_id: event.id,
            attendee_id: attendee.id,
            occurred_at: w.now,
        };

        assert!(
            w.lifecycle
                .remove_attendee(&elsewhere, cmd.clone())
                .unwrap_err()
                .is_forbidden()
        );
        w.lifecycle.remove_attendee(&director, cmd.clone()).unwrap();
        assert!(w.read(|r| r.attendee(attendee.id)).is_none());
        assert!(w.lifecycle.remove_attendee(&director, cmd).unwrap_err().is_not_found());
    }

    #[test]
    fn verified_payment_marks_paid_and_going() {
        let w = World::new();
        let chapter = w.chapter("Yelahanka");
        let user = w.user(Role::User, w.here());
        let mut event = w.event(&chapter, Duration::days(2));
        event.entry_fee = 500;
        w.store
            .transaction(|tx| {
                tx.delete_event(event.id)?;
                tx.insert_event(event.clone())
            })
            .map_err(|e: crate::store::StoreError| e)
            .unwrap();
        let signature = PaymentVerifier::new(PAYMENT_SECRET)
            .sign("order_9", "pay_9")
            .unwrap();

        let attendee = w
            .lifecycle
            .verify_payment(
                &World::actor(&user),
                VerifyPayment {
                    event_id: event.id,
                    order_id: "order_9".to_string(),
                    payment_id: "pay_9".to_string(),
                    signature,
                    occurred_at: w.now,
                },
            )
            .unwrap();

        assert_eq!(attendee.payment_status, PaymentStatus::Paid);
        assert_eq!(attendee.status, AttendeeStatus::Going);
        assert_eq!(attendee.amount_paid, 500);
        assert_eq!(attendee.payment_id.as_deref(), Some("pay_9"));
        assert_eq!(w.read(|r| r.attendee_for(event.id, user.id)), Some(attendee));
    }

    #[test]
    fn bad_signature_and_missing_secret() {
        let w = World::new();
        let chapter = w.chapter("Rajajinagar");
        let user = w.user(Role::User, w.here());
        let event = w.event(&chapter, Duration::days(2));
        let cmd = VerifyPayment {
            event_id: event.id,
            order_id: "order_1".to_string(),
            payment_id: "pay_1".to_string(),
            signature: "00".repeat(32),
            occurred_at: w.now,
        };

        let err = w
            .lifecycle
            .verify_payment(&World::actor(&user), cmd.clone())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(w.read(|r| r.attendee_for(event.id, user.id)).is_none());

        let unconfigured = Lifecycle::new(
            InMemoryStore::new(),
            RecordingMailer::new(),
            AppConfig::default(),
        );
        let err = unconfigured
            .verify_payment(&World::actor(&user), cmd)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Configuration(_)));
    }
}
