//! Outbound invitation mail.
//!
//! Sending is fire-and-forget: lifecycle operations hand their invitations to
//! [`InviteDispatcher::dispatch`] only after the transaction has committed, and
//! a failed send is logged, never retried and never surfaced to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use chapterhub_chapters::Event;

use crate::config::AppConfig;

pub const DEFAULT_VENUE: &str = "Online";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

/// What an invitation says about the meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    /// `HH:MM`.
    pub time: String,
    pub venue: String,
    pub entry_fee: u32,
    pub link: String,
}

impl MeetingDetails {
    pub fn for_event(event: &Event, config: &AppConfig) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            date: event.date,
            time: event.date.format("%H:%M").to_string(),
            venue: event
                .venue
                .clone()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_VENUE.to_string()),
            entry_fee: event.entry_fee,
            link: config.event_link(event.id),
        }
    }
}

/// Mail transport. Recipients are blind-copied on a single message.
pub trait Mailer: Send + Sync {
    fn send_invites(&self, recipients: &[String], details: &MeetingDetails)
    -> Result<(), MailError>;
}

impl<M> Mailer for Arc<M>
where
    M: Mailer + ?Sized,
{
    fn send_invites(
        &self,
        recipients: &[String],
        details: &MeetingDetails,
    ) -> Result<(), MailError> {
        (**self).send_invites(recipients, details)
    }
}

/// An invitation collected inside a transaction, sent after commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Invitation {
    pub event: Event,
    pub recipients: Vec<String>,
}

pub struct InviteDispatcher<M> {
    mailer: M,
    config: AppConfig,
}

impl<M: Mailer> InviteDispatcher<M> {
    pub fn new(mailer: M, config: AppConfig) -> Self {
        Self { mailer, config }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// Send every invitation; returns how many messages went out.
    pub fn dispatch(&self, invitations: Vec<Invitation>) -> usize {
        let invitations: Vec<Invitation> = invitations
            .into_iter()
            .filter(|i| !i.recipients.is_empty())
            .collect();
        if invitations.is_empty() {
            return 0;
        }
        if self.config.mail_from.is_none() {
            tracing::warn!(
                count = invitations.len(),
                "MAIL_FROM not configured; skipping invitation mail"
            );
            return 0;
        }

        let mut sent = 0;
        for invitation in invitations {
            let details = MeetingDetails::for_event(&invitation.event, &self.config);
            match self.mailer.send_invites(&invitation.recipients, &details) {
                Ok(()) => {
                    sent += 1;
                    tracing::info!(
                        event_id = %invitation.event.id,
                        recipients = invitation.recipients.len(),
                        "invitation sent"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        event_id = %invitation.event.id,
                        recipients = invitation.recipients.len(),
                        error = %err,
                        "invitation send failed"
                    );
                }
            }
        }
        sent
    }
}

/// Mailer that only logs. Used where no transport is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_invites(
        &self,
        recipients: &[String],
        details: &MeetingDetails,
    ) -> Result<(), MailError> {
        tracing::info!(
            title = %details.title,
            recipients = recipients.len(),
            link = %details.link,
            "invitation (log only)"
        );
        Ok(())
    }
}

/// Mailer that records every message; can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(Vec<String>, MeetingDetails)>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Vec<String>, MeetingDetails)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Mailer for RecordingMailer {
    fn send_invites(
        &self,
        recipients: &[String],
        details: &MeetingDetails,
    ) -> Result<(), MailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Transport("recording mailer set to fail".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| MailError::Transport("lock poisoned".to_string()))?;
        sent.push((recipients.to_vec(), details.clone()));
        Ok(())
    }
}
