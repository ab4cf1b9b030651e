use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::email::Message;
use crate::error::PrinterError;
use crate::printer::{PrintJob, Printer};

/// Outcome of printing one `[bot]` message
#[derive(Debug, Default)]
pub struct PrintReport {
    pub completed: Vec<PrintJob>,
    /// Spooler failures. Each one raises the error state.
    pub printer_errors: Vec<PrinterError>,
    /// Files that could not be staged; silently dropped.
    pub staging_failures: usize,
}

/// Stages message bodies and attachments as files and feeds them to the
/// printer strictly one at a time.
pub struct PrintJobQueue<P: Printer> {
    printer: P,
    staging_dir: PathBuf,
    title: String,
    error_policy: String,
    poll_interval: Duration,
    submit_delay: Duration,
    counter: u32,
}

impl<P: Printer> PrintJobQueue<P> {
    pub fn new(printer: P, config: &Config) -> Self {
        PrintJobQueue {
            printer,
            staging_dir: config.print_dir.clone(),
            title: config.print_job_title.clone(),
            error_policy: config.printer_error_policy.clone(),
            poll_interval: config.print_poll_interval(),
            submit_delay: config.print_submit_delay(),
            counter: 1,
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Empty the staging directory so nothing from an earlier pass lingers.
    pub fn reset_staging(&self) -> Result<(), PrinterError> {
        match std::fs::remove_dir_all(&self.staging_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(PrinterError::Io {
                    path: self.staging_dir.clone(),
                    source,
                })
            }
        }
        std::fs::create_dir_all(&self.staging_dir).map_err(|source| PrinterError::Io {
            path: self.staging_dir.clone(),
            source,
        })?;
        debug!("Staging directory {:?} reset", self.staging_dir);
        Ok(())
    }

    /// Apply the error policy. Done once per pass.
    pub async fn connect(&self) -> Result<(), PrinterError> {
        info!("Connecting to printer");
        self.printer.set_error_policy(&self.error_policy).await?;
        info!("Printer connection established");
        Ok(())
    }

    /// Cancel whatever a stalled earlier run left behind and reopen the queue.
    pub async fn prepare(&self) -> Result<(), PrinterError> {
        info!("Checking printer status");
        self.printer.cancel_all_jobs().await?;
        self.printer.accept_jobs().await
    }

    /// Print the body (if any) and every named attachment of a `[bot]` message.
    ///
    /// Never touches the read flag; the dispatcher consumes the message once
    /// this returns, whatever the report says.
    pub async fn handle_print(&mut self, message: &Message) -> PrintReport {
        let mut report = PrintReport::default();
        debug!("Found message: {:?}", message.subject);

        let body = message.body.trim();
        if !body.is_empty() {
            let path = self.staging_dir.join(format!("{}.txt", self.counter));
            self.counter += 1;
            debug!("Writing message body to {:?}", path);
            match std::fs::write(&path, body) {
                Ok(()) => self.print_into(&path, &mut report).await,
                Err(e) => {
                    error!("Unable to stage message body at {:?}: {}", path, e);
                    report.staging_failures += 1;
                }
            }
        }

        for attachment in &message.attachments {
            let Some(name) = attachment.sanitized_name() else {
                continue;
            };
            // Same sanitized name twice in a row overwrites the staged file
            let path = self.staging_dir.join(&name);
            debug!("Found attachment {}", name);
            match std::fs::write(&path, &attachment.content) {
                Ok(()) => {
                    debug!("Saved attachment at {:?}", path);
                    self.print_into(&path, &mut report).await;
                }
                Err(e) => {
                    error!("Unable to save attachment {}: {}", name, e);
                    report.staging_failures += 1;
                }
            }
        }

        report
    }

    async fn print_into(&self, path: &Path, report: &mut PrintReport) {
        match self.print_file(path).await {
            Ok(job) => report.completed.push(job),
            Err(e) => {
                error!("❌ Printing {:?} failed: {}", path, e);
                report.printer_errors.push(e);
            }
        }
    }

    /// Submit `path`, wait until the spooler is done with it, then delete it.
    pub async fn print_file(&self, path: &Path) -> Result<PrintJob, PrinterError> {
        debug!("Printing file: {:?}", path);
        let id = self.printer.submit(path, &self.title).await?;
        let mut job = PrintJob::submitted(path.to_path_buf(), &self.title, id);

        tokio::time::sleep(self.submit_delay).await;
        job.mark_active();
        self.printer
            .await_completion(&job.id, self.poll_interval)
            .await?;
        job.mark_completed();

        if let Err(e) = std::fs::remove_file(path) {
            warn!("Printed {:?} but could not delete it: {}", path, e);
        }
        debug!("Printed: {:?} ({})", path, job.id);
        Ok(job)
    }

    /// Print every file already sitting in the staging directory, in name
    /// order. Stops at the first failure.
    pub async fn print_pending(&self) -> Result<usize, PrinterError> {
        self.prepare().await?;

        info!("Printing pending files");
        let entries = std::fs::read_dir(&self.staging_dir).map_err(|source| PrinterError::Io {
            path: self.staging_dir.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        for path in &files {
            self.print_file(path).await?;
        }

        info!("✅ Printed all {} pending file(s)", files.len());
        Ok(files.len())
    }
}
