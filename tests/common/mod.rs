// In-memory stand-ins for the mail server, the spooler and the SMTP outbox
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mailbot::config::{Config, Credentials};
use mailbot::email::{Attachment, MailConnector, MailSession, Message, OutgoingMail, Outbox};
use mailbot::error::{MailError, PrinterError};
use mailbot::printer::{JobId, Printer};

/// Config with every path inside `dir` and every delay set to zero
pub fn test_config(dir: &Path) -> Config {
    Config {
        credentials_path: dir.join("credentials.txt"),
        print_dir: dir.join("print"),
        token_path: dir.join("mailbot_token.txt"),
        mail_log_path: dir.join("email.log"),
        printer_log_path: dir.join("printer.log"),
        imap_host: "imap.test".to_string(),
        imap_port: 993,
        smtp_host: "smtp.test".to_string(),
        smtp_port: 465,
        agent_name: "Test Pi".to_string(),
        printer_name: "FAKE".to_string(),
        print_job_title: "MAILBOT".to_string(),
        printer_error_policy: "abort-job".to_string(),
        retry_budget: 3,
        follow_up_cycles: 0,
        cycle_spacing_secs: 0,
        print_poll_interval_secs: 0,
        print_submit_delay_secs: 0,
        scheduler_cron: "0 0 * * * *".to_string(),
    }
}

pub const ALICE: &str = "alice@example.com";
pub const BOB: &str = "bob@example.com";

pub fn test_credentials() -> Credentials {
    Credentials {
        account: "bot@example.com".to_string(),
        password: "secret".to_string(),
        contacts: vec![ALICE.to_string(), BOB.to_string()],
    }
}

pub fn message(uid: u32, sender: &str, subject: Option<&str>, body: &str) -> Message {
    Message {
        uid,
        sender: sender.to_string(),
        subject: subject.map(str::to_string),
        body: body.to_string(),
        attachments: Vec::new(),
        read: false,
    }
}

pub fn with_attachment(mut message: Message, name: &str, content: &str) -> Message {
    message
        .attachments
        .push(Attachment::new(name, content.as_bytes().to_vec()));
    message
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Server-side state shared by the connector and every session it opens
#[derive(Debug, Default)]
pub struct Mailbox {
    pub messages: Vec<Message>,
    pub sent: Vec<SentReply>,
    /// UID of every message flagged read, once per server call
    pub marked_read: Vec<u32>,
    pub login_attempts: u32,
    pub logouts: u32,
    pub login_failures: VecDeque<MailError>,
    pub fetch_failures: VecDeque<MailError>,
    pub send_failures: VecDeque<MailError>,
    pub mark_read_failures: VecDeque<MailError>,
}

impl Mailbox {
    pub fn is_read(&self, uid: u32) -> bool {
        self.messages.iter().any(|m| m.uid == uid && m.read)
    }
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub mailbox: Arc<Mutex<Mailbox>>,
}

impl FakeConnector {
    pub fn with_messages(messages: Vec<Message>) -> Self {
        let connector = FakeConnector::default();
        connector.mailbox.lock().unwrap().messages = messages;
        connector
    }

    pub fn fail_logins(&self, errors: Vec<MailError>) {
        self.mailbox.lock().unwrap().login_failures.extend(errors);
    }

    pub fn fail_fetches(&self, errors: Vec<MailError>) {
        self.mailbox.lock().unwrap().fetch_failures.extend(errors);
    }

    pub fn fail_sends(&self, errors: Vec<MailError>) {
        self.mailbox.lock().unwrap().send_failures.extend(errors);
    }

    pub fn fail_mark_reads(&self, errors: Vec<MailError>) {
        self.mailbox.lock().unwrap().mark_read_failures.extend(errors);
    }

    pub fn session(&self) -> FakeSession {
        FakeSession {
            mailbox: self.mailbox.clone(),
            logged_out: false,
        }
    }
}

impl MailConnector for FakeConnector {
    type Session = FakeSession;

    async fn login(&self, _credentials: &Credentials) -> Result<FakeSession, MailError> {
        let mut mailbox = self.mailbox.lock().unwrap();
        mailbox.login_attempts += 1;
        if let Some(e) = mailbox.login_failures.pop_front() {
            return Err(e);
        }
        drop(mailbox);
        Ok(self.session())
    }
}

pub struct FakeSession {
    mailbox: Arc<Mutex<Mailbox>>,
    logged_out: bool,
}

impl MailSession for FakeSession {
    async fn fetch_unread(&mut self, contact: &str) -> Result<Vec<Message>, MailError> {
        let mut mailbox = self.mailbox.lock().unwrap();
        if let Some(e) = mailbox.fetch_failures.pop_front() {
            return Err(e);
        }
        Ok(mailbox
            .messages
            .iter()
            .filter(|m| m.sender == contact && !m.read)
            .cloned()
            .collect())
    }

    async fn mark_read(&mut self, message: &mut Message) -> Result<(), MailError> {
        if message.read {
            return Ok(());
        }
        let mut mailbox = self.mailbox.lock().unwrap();
        if let Some(e) = mailbox.mark_read_failures.pop_front() {
            return Err(e);
        }
        mailbox.marked_read.push(message.uid);
        if let Some(stored) = mailbox.messages.iter_mut().find(|m| m.uid == message.uid) {
            stored.read = true;
        }
        message.read = true;
        Ok(())
    }

    async fn send(&mut self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let mut mailbox = self.mailbox.lock().unwrap();
        if let Some(e) = mailbox.send_failures.pop_front() {
            return Err(e);
        }
        mailbox.sent.push(SentReply {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn logout(&mut self) {
        if !self.logged_out {
            self.logged_out = true;
            self.mailbox.lock().unwrap().logouts += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub file_name: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct SpoolerState {
    pub policies: Vec<String>,
    pub cancels: u32,
    pub accepts: u32,
    pub submissions: Vec<Submission>,
    /// Submissions made while another job was still active
    pub overlaps: u32,
    pub active: Option<(JobId, u32)>,
    pub next_id: u32,
    pub polls_per_job: u32,
    pub fail_submit: bool,
    pub fail_prepare: bool,
}

/// Spooler that keeps each job active for `polls_per_job` polls
#[derive(Clone, Default)]
pub struct FakePrinter {
    pub state: Arc<Mutex<SpoolerState>>,
}

impl FakePrinter {
    pub fn with_polls(polls_per_job: u32) -> Self {
        let printer = FakePrinter::default();
        printer.state.lock().unwrap().polls_per_job = polls_per_job;
        printer
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    fn tool_error(tool: &str) -> PrinterError {
        PrinterError::Tool {
            tool: tool.to_string(),
            status: 1,
            stderr: "printer not responding".to_string(),
        }
    }
}

impl Printer for FakePrinter {
    async fn set_error_policy(&self, policy: &str) -> Result<(), PrinterError> {
        self.state.lock().unwrap().policies.push(policy.to_string());
        Ok(())
    }

    async fn cancel_all_jobs(&self) -> Result<(), PrinterError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_prepare {
            return Err(Self::tool_error("cancel"));
        }
        state.cancels += 1;
        state.active = None;
        Ok(())
    }

    async fn accept_jobs(&self) -> Result<(), PrinterError> {
        self.state.lock().unwrap().accepts += 1;
        Ok(())
    }

    async fn submit(&self, path: &Path, title: &str) -> Result<JobId, PrinterError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_submit {
            return Err(Self::tool_error("lp"));
        }
        if state.active.is_some() {
            state.overlaps += 1;
        }

        let content = std::fs::read_to_string(path).map_err(|source| PrinterError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        state.submissions.push(Submission {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            title: title.to_string(),
            content,
        });

        state.next_id += 1;
        let id = JobId(format!("FAKE-{}", state.next_id));
        state.active = Some((id.clone(), state.polls_per_job));
        Ok(id)
    }

    async fn is_active(&self, job: &JobId) -> Result<bool, PrinterError> {
        let mut state = self.state.lock().unwrap();
        let remaining = match state.active.as_mut() {
            Some((id, remaining)) if id == job => remaining,
            _ => return Ok(false),
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(true);
        }
        state.active = None;
        Ok(false)
    }
}

/// Records every outgoing mail; can be told to fail
#[derive(Default)]
pub struct FakeOutbox {
    pub sent: Mutex<Vec<OutgoingMail>>,
    pub fail: bool,
}

impl FakeOutbox {
    pub fn failing() -> Self {
        FakeOutbox {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Outbox for FakeOutbox {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::transport("smtp.test", "connection refused"));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}
