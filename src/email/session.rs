//! Narrow interfaces the agent consumes from the mail transport.
//!
//! [`MailConnector::login`] yields a fresh [`MailSession`] per attempt. The
//! caller owns the session for the duration of that attempt and must call
//! [`MailSession::logout`] on every exit path before the next attempt begins.
#![allow(async_fn_in_trait)]

use crate::config::Credentials;
use crate::email::common::{Message, OutgoingMail};
use crate::error::MailError;

/// Outbound transport. Used alone by the reporting pass.
pub trait Outbox {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// An authenticated mailbox plus outbound transport.
pub trait MailSession {
    /// Unread messages from `contact`, bodies and attachments included.
    /// Fetching does not mark anything read.
    async fn fetch_unread(&mut self, contact: &str) -> Result<Vec<Message>, MailError>;

    /// Flag the message as read on the server. A message already read is
    /// left alone.
    async fn mark_read(&mut self, message: &mut Message) -> Result<(), MailError>;

    async fn send(&mut self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;

    /// Idempotent; safe on a session that is already logged out.
    async fn logout(&mut self);
}

/// Creates sessions. Fails with [`MailError::Auth`] on rejected credentials.
pub trait MailConnector {
    type Session: MailSession;

    async fn login(&self, credentials: &Credentials) -> Result<Self::Session, MailError>;
}
