use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

use crate::config::{Config, Credentials};
use crate::email::{Attachment, OutgoingMail, Outbox};

/// Token content written on fatal failure
pub const STATUS_ERROR: &str = "1";

pub const DIGEST_SUBJECT: &str = "Error report";

/// Sticky failure flag backed by the token file.
///
/// Raising writes the token right away so the flag survives a crash or
/// restart. Only a successful reporting pass removes it.
#[derive(Debug)]
pub struct ErrorState {
    token_path: PathBuf,
    cause: Option<String>,
}

impl ErrorState {
    pub fn new(token_path: impl Into<PathBuf>) -> Self {
        ErrorState {
            token_path: token_path.into(),
            cause: None,
        }
    }

    pub fn raise(&mut self, cause: impl Into<String>) {
        let cause = cause.into();
        error!("Error state raised: {}", cause);
        if self.cause.is_none() {
            if let Err(e) = write_token(&self.token_path, STATUS_ERROR) {
                error!("Unable to write error token {:?}: {}", self.token_path, e);
            }
            self.cause = Some(cause);
        }
    }

    pub fn is_raised(&self) -> bool {
        self.cause.is_some()
    }

    /// First cause recorded in this process
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }
}

pub fn write_token(path: &Path, status: &str) -> std::io::Result<()> {
    std::fs::write(path, status)
}

/// What the reporting pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    NothingToReport,
    Sent { logs_attached: usize },
}

/// Mails accumulated logs to every contact when a failure token is present,
/// then clears the token and the logs.
pub struct ErrorReporter {
    token_path: PathBuf,
    log_paths: Vec<PathBuf>,
    contacts: Vec<String>,
}

impl ErrorReporter {
    pub fn new(config: &Config, credentials: &Credentials) -> Self {
        ErrorReporter {
            token_path: config.token_path.clone(),
            log_paths: config.log_paths().iter().map(|p| p.to_path_buf()).collect(),
            contacts: credentials.contacts.clone(),
        }
    }

    pub fn with_paths(token_path: PathBuf, log_paths: Vec<PathBuf>, contacts: Vec<String>) -> Self {
        ErrorReporter {
            token_path,
            log_paths,
            contacts,
        }
    }

    /// Status code in the token, `None` when there is nothing to report.
    pub fn pending_status(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.token_path) {
            Ok(status) => Ok(Some(status.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Unable to read token {:?}", self.token_path)),
        }
    }

    /// A send failure leaves the token and logs in place for the next pass.
    pub async fn report<O: Outbox>(&self, outbox: &O) -> Result<ReportOutcome> {
        let Some(status) = self.pending_status()? else {
            debug!("No error token at {:?}, nothing to report", self.token_path);
            return Ok(ReportOutcome::NothingToReport);
        };
        info!("Error token found (status {}), sending digest", status);

        let digest = self.compose_digest()?;
        let logs_attached = digest.attachments.len();
        outbox
            .send(&digest)
            .await
            .context("Unable to send the error digest")?;
        info!("✅ Digest sent to {} contact(s)", self.contacts.len());

        self.cleanup()?;
        Ok(ReportOutcome::Sent { logs_attached })
    }

    fn compose_digest(&self) -> Result<OutgoingMail> {
        let mut attachments = Vec::new();
        for path in &self.log_paths {
            match std::fs::read(path) {
                Ok(content) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "log.txt".to_string());
                    attachments.push(Attachment::new(name, content));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Log {:?} does not exist, not attached", path);
                }
                Err(e) => return Err(e).with_context(|| format!("Unable to read log {:?}", path)),
            }
        }

        Ok(OutgoingMail {
            to: self.contacts.clone(),
            subject: DIGEST_SUBJECT.to_string(),
            body: String::new(),
            attachments,
        })
    }

    fn cleanup(&self) -> Result<()> {
        for path in std::iter::once(&self.token_path).chain(self.log_paths.iter()) {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("Unable to remove {:?}", path)),
            }
        }
        Ok(())
    }
}
