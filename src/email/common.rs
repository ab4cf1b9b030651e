//! Value types exchanged between the mail transport and the dispatcher

use std::path::{Component, Path};

/// A whitelisted sender address, loaded once at startup.
pub type Contact = String;

/// File attached to an incoming or outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: Option<String>,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Attachment {
            name: Some(name.into()),
            content,
        }
    }

    /// Name usable as a staging file name, with every whitespace character
    /// removed and any directory part dropped. `None` when the part carries
    /// no usable name.
    pub fn sanitized_name(&self) -> Option<String> {
        self.name.as_deref().and_then(sanitize_file_name)
    }
}

/// `"my file (1).pdf"` becomes `"myfile(1).pdf"`. Only the last path
/// component survives, so the result always stays inside the staging
/// directory; `None` for empty, `.` or `..` names.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let compact: String = name.split_whitespace().collect();
    let last = compact.rsplit(['/', '\\']).next()?;
    match Path::new(last).components().next() {
        Some(Component::Normal(part)) => Some(part.to_string_lossy().into_owned()),
        _ => None,
    }
}

/// An unread message fetched from one contact
#[derive(Debug, Clone)]
pub struct Message {
    pub uid: u32,
    pub sender: Contact,
    pub subject: Option<String>,
    pub body: String,
    pub attachments: Vec<Attachment>,
    /// Flips to true exactly once, when the dispatcher consumes the message.
    pub read: bool,
}

impl Message {
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Whether the decoded sender address is `contact`. Display names never
    /// count.
    pub fn is_from(&self, contact: &str) -> bool {
        self.sender.trim().eq_ignore_ascii_case(contact.trim())
    }
}

/// A message leaving the agent through SMTP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: Vec<Contact>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl OutgoingMail {
    pub fn reply(to: &str, subject: impl Into<String>, body: impl Into<String>) -> Self {
        OutgoingMail {
            to: vec![to.to_string()],
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }
}

/// Counters for a single fetch/dispatch cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub dispatched: usize,
    pub ignored: usize,
    pub commands_failed: usize,
    pub print_jobs: usize,
    pub attempts: u32,
}
