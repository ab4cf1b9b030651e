//! Error types shared by the mail, printer and credentials components

use std::path::PathBuf;

/// Failures reported by the mail transport (IMAP and SMTP).
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// The server rejected the credentials. Never retried.
    #[error("authentication rejected by {server}: {reason}")]
    Auth { server: String, reason: String },

    /// Connection dropped, timeout, protocol hiccup. Worth another attempt.
    #[error("transport failure on {server}: {reason}")]
    Transport { server: String, reason: String },

    /// The server refused the message itself (5xx, bad recipient). A new
    /// login cannot change the answer.
    #[error("message rejected by {server}: {reason}")]
    Rejected { server: String, reason: String },

    #[error("unable to decode message {uid}: {reason}")]
    Parse { uid: u32, reason: String },
}

impl MailError {
    pub fn auth(server: impl Into<String>, reason: impl ToString) -> Self {
        MailError::Auth {
            server: server.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transport(server: impl Into<String>, reason: impl ToString) -> Self {
        MailError::Transport {
            server: server.into(),
            reason: reason.to_string(),
        }
    }

    pub fn rejected(server: impl Into<String>, reason: impl ToString) -> Self {
        MailError::Rejected {
            server: server.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, MailError::Auth { .. })
    }

    /// Whether a fresh login may succeed where this attempt failed
    pub fn is_transient(&self) -> bool {
        matches!(self, MailError::Transport { .. })
    }
}

/// Failures reported by the printer spooler collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PrinterError {
    #[error("unable to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with status {status}: {stderr}")]
    Tool {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error("unexpected output from {tool}: {output}")]
    UnexpectedOutput { tool: String, output: String },

    #[error("staging I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while reading the credentials file.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("unable to read credentials file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credentials file {path:?} is missing the {field} line")]
    Missing { path: PathBuf, field: &'static str },
}
