//! Session state shared by the views.
//!
//! Views subscribe by [`ViewId`]; a sign-in or sign-out that actually
//! changes the state yields a [`Notification`] naming every subscriber, which
//! the app fans out.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::info;

use crate::model::{Username, ViewId};
use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session for {username} expired at {expires_at}")]
    Expired {
        username: String,
        expires_at: DateTime<Utc>,
    },
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::new(ErrorKind::Authentication, e.to_string())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionChange {
    LoggedIn,
    LoggedOut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub change: SessionChange,
    pub subscribers: Vec<ViewId>,
}

pub struct SessionRecord {
    pub username: Username,
    pub token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

// Token is redacted by SecretString; spell out the rest.
impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("username", &self.username)
            .field("token", &self.token)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Session {
    record: Option<SessionRecord>,
    subscribers: Vec<ViewId>,
}

impl Session {
    pub fn subscribe(&mut self, view: ViewId) {
        if !self.subscribers.contains(&view) {
            self.subscribers.push(view);
        }
    }

    pub fn unsubscribe(&mut self, view: ViewId) {
        self.subscribers.retain(|v| *v != view);
    }

    #[must_use]
    pub fn subscribers(&self) -> &[ViewId] {
        &self.subscribers
    }

    /// Current username; absent when signed out or when the token expired.
    #[must_use]
    pub fn username_at(&self, now: DateTime<Utc>) -> Option<&Username> {
        self.record_at(now).map(|r| &r.username)
    }

    #[must_use]
    pub fn token_at(&self, now: DateTime<Utc>) -> Option<&SecretString> {
        self.record_at(now).map(|r| &r.token)
    }

    #[must_use]
    pub fn is_logged_in(&self, now: DateTime<Utc>) -> bool {
        self.record_at(now).is_some()
    }

    /// The live record, if any.
    #[must_use]
    pub fn record_at(&self, now: DateTime<Utc>) -> Option<&SessionRecord> {
        self.record.as_ref().filter(|r| !r.is_expired(now))
    }

    pub fn sign_in(
        &mut self,
        record: SessionRecord,
        now: DateTime<Utc>,
    ) -> Result<Notification, SessionError> {
        if let Some(expires_at) = record.expires_at.filter(|_| record.is_expired(now)) {
            return Err(SessionError::Expired {
                username: record.username.to_string(),
                expires_at,
            });
        }

        info!(username = %record.username, "session started");
        self.record = Some(record);
        Ok(self.notification(SessionChange::LoggedIn))
    }

    /// `None` when there was no session to end.
    pub fn sign_out(&mut self) -> Option<Notification> {
        let record = self.record.take()?;
        info!(username = %record.username, "session ended");
        Some(self.notification(SessionChange::LoggedOut))
    }

    /// Ends a session whose token ran out since the last event.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<Notification> {
        if self.record.as_ref().is_some_and(|r| r.is_expired(now)) {
            return self.sign_out();
        }
        None
    }

    fn notification(&self, change: SessionChange) -> Notification {
        Notification {
            change,
            subscribers: self.subscribers.clone(),
        }
    }
}
