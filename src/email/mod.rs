pub mod common;
pub mod imap_session;
pub mod outbox;
pub mod parser;
pub mod session;

// Re-export commonly used items
pub use common::{Attachment, Contact, CycleReport, Message, OutgoingMail};
pub use imap_session::{ImapConnector, ImapSmtpSession};
pub use outbox::SmtpOutbox;
pub use session::{MailConnector, MailSession, Outbox};
