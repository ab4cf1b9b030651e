//! Printer spooler collaborator and the serialized job queue built on it.
#![allow(async_fn_in_trait)]

pub mod cups;
pub mod queue;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PrinterError;

pub use cups::CupsPrinter;
pub use queue::{PrintJobQueue, PrintReport};

/// Spooler-assigned job identifier, e.g. `EPSON-42`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations the agent needs from the spooler for one named printer.
pub trait Printer {
    async fn set_error_policy(&self, policy: &str) -> Result<(), PrinterError>;

    async fn cancel_all_jobs(&self) -> Result<(), PrinterError>;

    /// Re-enable the queue and let it accept new jobs
    async fn accept_jobs(&self) -> Result<(), PrinterError>;

    async fn submit(&self, path: &Path, title: &str) -> Result<JobId, PrinterError>;

    /// Whether `job` is still in the spooler's active-job set
    async fn is_active(&self, job: &JobId) -> Result<bool, PrinterError>;

    /// Block until `job` has left the active-job set.
    async fn await_completion(
        &self,
        job: &JobId,
        poll_interval: Duration,
    ) -> Result<(), PrinterError> {
        while self.is_active(job).await? {
            tokio::time::sleep(poll_interval).await;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Active,
    Completed,
}

/// One file handed to the spooler. The source file is deleted only once the
/// job is [`JobState::Completed`].
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub source: PathBuf,
    pub title: String,
    pub id: JobId,
    pub state: JobState,
}

impl PrintJob {
    pub fn submitted(source: PathBuf, title: &str, id: JobId) -> Self {
        PrintJob {
            source,
            title: title.to_string(),
            id,
            state: JobState::Submitted,
        }
    }

    pub fn mark_active(&mut self) {
        if self.state == JobState::Submitted {
            self.state = JobState::Active;
        }
    }

    pub fn mark_completed(&mut self) {
        self.state = JobState::Completed;
    }
}
