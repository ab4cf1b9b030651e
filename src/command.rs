use log::{debug, error, info};
use std::process::Stdio;
use tokio::process::Command;

use crate::classifier::command_text;
use crate::email::{MailSession, Message};
use crate::error::MailError;

/// Captured result of one shell invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub status: Option<i32>,
    /// Standard output followed by standard error
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// What happened to a `[cmd]` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Replied,
    Failed { status: Option<i32> },
    NotStarted { reason: String },
}

/// Runs `[cmd]` subjects through the host shell and mails back the output.
///
/// The sender whitelist is the only access control. Command text is not
/// inspected.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: String,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        CommandExecutor {
            shell: "sh".to_string(),
        }
    }
}

impl CommandExecutor {
    pub async fn run(&self, command: &str) -> std::io::Result<CommandOutput> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            status: output.status.code(),
            output: text,
        })
    }

    /// Execute the message's command and reply to `contact` on success.
    ///
    /// A failing command gets no reply. The message is marked read in every
    /// case, and a reply transport error is only returned after that.
    pub async fn execute<S: MailSession>(
        &self,
        session: &mut S,
        contact: &str,
        message: &mut Message,
    ) -> Result<CommandOutcome, MailError> {
        let subject = message.subject.clone().unwrap_or_default();
        let outcome = match command_text(&subject) {
            Some(command) if !command.is_empty() => {
                self.run_and_reply(session, contact, &subject, command).await
            }
            _ => Ok(CommandOutcome::NotStarted {
                reason: "empty command".to_string(),
            }),
        };

        session.mark_read(message).await?;
        outcome
    }

    async fn run_and_reply<S: MailSession>(
        &self,
        session: &mut S,
        contact: &str,
        subject: &str,
        command: &str,
    ) -> Result<CommandOutcome, MailError> {
        debug!("Executing {}", command);
        match self.run(command).await {
            Ok(result) if result.success() => {
                info!("✅ Contact command executed successfully");
                session
                    .send(contact, &format!("Re: {}", subject), &result.output)
                    .await?;
                Ok(CommandOutcome::Replied)
            }
            Ok(result) => {
                error!("❌ Contact command returned {:?}", result.status);
                debug!("Output:\n{}", result.output);
                Ok(CommandOutcome::Failed {
                    status: result.status,
                })
            }
            Err(e) => {
                error!("❌ Unable to start '{}': {}", command, e);
                Ok(CommandOutcome::NotStarted {
                    reason: e.to_string(),
                })
            }
        }
    }
}
