//! Membership row transitions shared by every path that creates or deletes a
//! `ChapterMember`.
//!
//! Creating a membership always sets the user's chapter pointer and puts the
//! user on the chapter's upcoming events; deleting one always clears the
//! pointer, takes the user off upcoming events (past attendance stays) and
//! vacates the presidency if the user held it.

use chrono::{DateTime, Utc};

use chapterhub_chapters::{ChapterMember, EventAttendee};
use chapterhub_core::{ChapterId, UserId};

use crate::mail::Invitation;
use crate::store::Transaction;

use super::{LifecycleResult, user_or_not_found};

pub(crate) struct Enrollment {
    pub membership: ChapterMember,
    /// One per upcoming event the user was newly placed on.
    pub invitations: Vec<Invitation>,
}

/// Create a `MEMBER` row and bring the user's pointer and attendance in line.
///
/// Fails with a conflict if the pair already exists.
pub(crate) fn enroll(
    tx: &mut dyn Transaction,
    chapter_id: ChapterId,
    user_id: UserId,
    now: DateTime<Utc>,
) -> LifecycleResult<Enrollment> {
    let mut user = user_or_not_found(&*tx, user_id)?;

    let membership = ChapterMember::join(chapter_id, user_id, now);
    tx.insert_membership(membership.clone())?;

    user.chapter_id = Some(chapter_id);
    user.updated_at = now;
    let email = user.email.clone();
    tx.update_user(user)?;

    let invitations = sync_upcoming_attendance(tx, chapter_id, user_id, &email, now)?;
    Ok(Enrollment {
        membership,
        invitations,
    })
}

/// Put the user on every upcoming event of the chapter they are not already on.
pub(crate) fn sync_upcoming_attendance(
    tx: &mut dyn Transaction,
    chapter_id: ChapterId,
    user_id: UserId,
    email: &str,
    now: DateTime<Utc>,
) -> LifecycleResult<Vec<Invitation>> {
    let mut invitations = Vec::new();
    for event in tx.chapter_events(chapter_id) {
        if !event.is_upcoming(now) || tx.attendee_for(event.id, user_id).is_some() {
            continue;
        }
        tx.insert_attendee(EventAttendee::invite(event.id, user_id, now))?;
        invitations.push(Invitation {
            event,
            recipients: vec![email.to_string()],
        });
    }
    Ok(invitations)
}

/// Delete one membership row and everything that hangs off it.
pub(crate) fn withdraw(
    tx: &mut dyn Transaction,
    membership: &ChapterMember,
    now: DateTime<Utc>,
) -> LifecycleResult<()> {
    let chapter_id = membership.chapter_id;
    let user_id = membership.user_id;

    tx.delete_membership(membership.id)?;

    if let Some(mut user) = tx.user(user_id) {
        if user.chapter_id == Some(chapter_id) {
            user.chapter_id = None;
            user.updated_at = now;
            tx.update_user(user)?;
        }
    }

    for event in tx.chapter_events(chapter_id) {
        if !event.is_upcoming(now) {
            continue;
        }
        if let Some(attendee) = tx.attendee_for(event.id, user_id) {
            tx.delete_attendee(attendee.id)?;
        }
    }

    if let Some(mut chapter) = tx.chapter(chapter_id) {
        if chapter.president_id == Some(user_id) {
            chapter.president_id = None;
            chapter.updated_at = now;
            tx.update_chapter(chapter)?;
        }
    }
    Ok(())
}

/// Remove every membership the user holds and clear any stale pointer.
/// Returns the number of membership rows deleted.
pub(crate) fn detach_from_all(
    tx: &mut dyn Transaction,
    user_id: UserId,
    now: DateTime<Utc>,
) -> LifecycleResult<usize> {
    let memberships = tx.user_memberships(user_id);
    for membership in &memberships {
        withdraw(tx, membership, now)?;
    }

    if let Some(mut user) = tx.user(user_id) {
        if user.chapter_id.is_some() {
            user.chapter_id = None;
            user.updated_at = now;
            tx.update_user(user)?;
        }
    }
    Ok(memberships.len())
}
