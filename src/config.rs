use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CredentialsError;

/// Runtime configuration, resolved once at startup and passed by reference.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub credentials_path: PathBuf,
    pub print_dir: PathBuf,
    pub token_path: PathBuf,
    pub mail_log_path: PathBuf,
    pub printer_log_path: PathBuf,
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub agent_name: String,
    pub printer_name: String,
    pub print_job_title: String,
    pub printer_error_policy: String,
    pub retry_budget: u32,
    pub follow_up_cycles: u32,
    pub cycle_spacing_secs: u64,
    pub print_poll_interval_secs: u64,
    pub print_submit_delay_secs: u64,
    pub scheduler_cron: String,
}

impl Config {
    /// Defaults overlaid with `MAILBOT_*` environment variables
    pub fn new() -> Result<Self> {
        let documents = dirs::home_dir()
            .context("Unable to determine the home directory")?
            .join("Documents");
        let path_default = |name: &str| documents.join(name).to_string_lossy().into_owned();

        let settings = config::Config::builder()
            .set_default("credentials_path", path_default("credentials.txt"))?
            .set_default("print_dir", path_default("print"))?
            .set_default("token_path", path_default("mailbot_token.txt"))?
            .set_default("mail_log_path", path_default("email.log"))?
            .set_default("printer_log_path", path_default("printer.log"))?
            .set_default("imap_host", "imap.gmail.com")?
            .set_default("imap_port", 993)?
            .set_default("smtp_host", "smtp.gmail.com")?
            .set_default("smtp_port", 465)?
            .set_default("agent_name", "Raspberry Pi 3")?
            .set_default("printer_name", "EPSON")?
            .set_default("print_job_title", "MAILBOT")?
            .set_default("printer_error_policy", "abort-job")?
            .set_default("retry_budget", 3)?
            .set_default("follow_up_cycles", 3)?
            .set_default("cycle_spacing_secs", 14 * 60)?
            .set_default("print_poll_interval_secs", 5)?
            .set_default("print_submit_delay_secs", 5)?
            .set_default("scheduler_cron", "0 0 * * * *")?
            .add_source(config::Environment::with_prefix("MAILBOT").try_parsing(true))
            .build()
            .context("Unable to assemble configuration")?;

        settings
            .try_deserialize()
            .context("Invalid MAILBOT_* configuration value")
    }

    pub fn cycle_spacing(&self) -> Duration {
        Duration::from_secs(self.cycle_spacing_secs)
    }

    pub fn print_poll_interval(&self) -> Duration {
        Duration::from_secs(self.print_poll_interval_secs)
    }

    pub fn print_submit_delay(&self) -> Duration {
        Duration::from_secs(self.print_submit_delay_secs)
    }

    /// Log files bundled into the digest, in attachment order
    pub fn log_paths(&self) -> [&Path; 2] {
        [self.mail_log_path.as_path(), self.printer_log_path.as_path()]
    }
}

/// Account and whitelist loaded from the credentials file.
#[derive(Clone)]
pub struct Credentials {
    pub account: String,
    pub password: String,
    pub contacts: Vec<String>,
}

// Keep the password out of logs and `--check-config` output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("password", &"********")
            .field("contacts", &self.contacts)
            .finish()
    }
}

impl Credentials {
    /// Line 1 is the account address, line 2 the password, every further
    /// non-blank line a whitelisted contact.
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let content = std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, CredentialsError> {
        let mut lines = content.lines().map(|line| line.trim_end_matches('\r'));

        let account = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .ok_or_else(|| CredentialsError::Missing {
                path: path.to_path_buf(),
                field: "account",
            })?
            .to_string();

        let password = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| CredentialsError::Missing {
                path: path.to_path_buf(),
                field: "password",
            })?
            .to_string();

        let contacts = lines
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Credentials {
            account,
            password,
            contacts,
        })
    }
}
