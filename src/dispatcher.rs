use log::{debug, info, warn};
use std::collections::HashSet;

use crate::classifier::{classify, Tag};
use crate::command::{CommandExecutor, CommandOutcome};
use crate::email::{CycleReport, MailSession, Message};
use crate::error::MailError;
use crate::printer::{PrintJobQueue, Printer};
use crate::reporter::ErrorState;

pub const PONG_SUBJECT: &str = "[pong]";
pub const PONG_BODY: &str = "";

/// Routes each fetched message to its handler and consumes it.
pub struct Dispatcher<P: Printer> {
    executor: CommandExecutor,
    queue: PrintJobQueue<P>,
    dry_run: bool,
    /// UIDs whose handler already ran in the current cycle
    handled: HashSet<u32>,
}

impl<P: Printer> Dispatcher<P> {
    pub fn new(executor: CommandExecutor, queue: PrintJobQueue<P>) -> Self {
        Dispatcher {
            executor,
            queue,
            dry_run: false,
            handled: HashSet::new(),
        }
    }

    /// Forget what earlier cycles handled. Retries inside a cycle keep the
    /// set, so a handler never runs twice for the same message.
    pub fn begin_cycle(&mut self) {
        self.handled.clear();
    }

    /// Classify and report only: nothing runs, prints, or gets marked read.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn queue(&self) -> &PrintJobQueue<P> {
        &self.queue
    }

    /// Fetch and dispatch every unread message from `contact`.
    pub async fn dispatch_contact<S: MailSession>(
        &mut self,
        session: &mut S,
        contact: &str,
        errors: &mut ErrorState,
        report: &mut CycleReport,
    ) -> Result<(), MailError> {
        let messages = self.fetch(session, contact, report).await?;
        self.dispatch_all(session, contact, messages, errors, report)
            .await
    }

    pub async fn fetch<S: MailSession>(
        &self,
        session: &mut S,
        contact: &str,
        report: &mut CycleReport,
    ) -> Result<Vec<Message>, MailError> {
        debug!("Fetching messages for {}", contact);
        let messages = session.fetch_unread(contact).await?;
        if messages.is_empty() {
            debug!("No messages to download.");
        }
        report.fetched += messages.len();
        Ok(messages)
    }

    pub async fn dispatch_all<S: MailSession>(
        &mut self,
        session: &mut S,
        contact: &str,
        messages: Vec<Message>,
        errors: &mut ErrorState,
        report: &mut CycleReport,
    ) -> Result<(), MailError> {
        for mut message in messages {
            self.dispatch(session, contact, &mut message, errors, report)
                .await?;
        }
        Ok(())
    }

    /// Handle one message. Every dispatched message is marked read exactly
    /// once, before any reply error is handed back to the caller.
    pub async fn dispatch<S: MailSession>(
        &mut self,
        session: &mut S,
        contact: &str,
        message: &mut Message,
        errors: &mut ErrorState,
        report: &mut CycleReport,
    ) -> Result<Tag, MailError> {
        if !message.is_from(contact) {
            warn!(
                "Message {} is from {}, not {}; ignored",
                message.uid, message.sender, contact
            );
            report.ignored += 1;
            return Ok(Tag::Ignore);
        }

        let tag = classify(message.subject());
        if tag == Tag::Ignore {
            debug!("Ignored message {}", message.uid);
            report.ignored += 1;
            return Ok(tag);
        }

        debug!("Found message: {:?} ({})", message.subject, tag);
        if self.dry_run {
            println!(
                "📧 {} from {}: {:?} ({} attachment(s))",
                tag,
                contact,
                message.subject().unwrap_or_default(),
                message.attachments.len()
            );
            return Ok(tag);
        }

        if !self.handled.insert(message.uid) {
            debug!("Message {} already handled this cycle, consuming it", message.uid);
            session.mark_read(message).await?;
            return Ok(tag);
        }
        report.dispatched += 1;

        match tag {
            Tag::Command => {
                let outcome = self.executor.execute(session, contact, message).await?;
                if outcome != CommandOutcome::Replied {
                    report.commands_failed += 1;
                }
            }
            Tag::Ping => {
                let sent = session.send(contact, PONG_SUBJECT, PONG_BODY).await;
                session.mark_read(message).await?;
                sent?;
                info!("Answered ping from {}", contact);
            }
            Tag::Print => {
                let printed = self.queue.handle_print(message).await;
                report.print_jobs += printed.completed.len();
                for e in &printed.printer_errors {
                    errors.raise(format!("printer: {}", e));
                }
                session.mark_read(message).await?;
            }
            Tag::Ignore => {}
        }

        Ok(tag)
    }
}
