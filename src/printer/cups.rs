use log::debug;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tokio::process::Command;

use crate::error::PrinterError;
use crate::printer::{JobId, Printer};

fn request_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"request id is (\S+)").ok())
        .as_ref()
}

/// Job id out of `lp` output such as `request id is EPSON-42 (1 file(s))`
pub fn parse_request_id(output: &str) -> Option<JobId> {
    request_id_regex()?
        .captures(output)
        .map(|caps| JobId(caps[1].to_string()))
}

/// Whether `lpstat -o` output still lists `job`
pub fn lists_job(lpstat_output: &str, job: &JobId) -> bool {
    lpstat_output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|id| id == job.0)
}

/// CUPS driven through its command-line tools.
#[derive(Debug, Clone)]
pub struct CupsPrinter {
    name: String,
}

impl CupsPrinter {
    pub fn new(name: impl Into<String>) -> Self {
        CupsPrinter { name: name.into() }
    }

    async fn run_tool(&self, tool: &str, args: &[&str]) -> Result<String, PrinterError> {
        debug!("Running {} {}", tool, args.join(" "));
        let output = Command::new(tool)
            .args(args)
            .output()
            .await
            .map_err(|source| PrinterError::Spawn {
                tool: tool.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(PrinterError::Tool {
                tool: tool.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Printer for CupsPrinter {
    async fn set_error_policy(&self, policy: &str) -> Result<(), PrinterError> {
        let option = format!("printer-error-policy={}", policy);
        self.run_tool("lpadmin", &["-p", self.name.as_str(), "-o", option.as_str()])
            .await
            .map(|_| ())
    }

    async fn cancel_all_jobs(&self) -> Result<(), PrinterError> {
        self.run_tool("cancel", &["-a", self.name.as_str()]).await.map(|_| ())
    }

    async fn accept_jobs(&self) -> Result<(), PrinterError> {
        self.run_tool("cupsenable", &[self.name.as_str()]).await?;
        self.run_tool("cupsaccept", &[self.name.as_str()]).await.map(|_| ())
    }

    async fn submit(&self, path: &Path, title: &str) -> Result<JobId, PrinterError> {
        let path = path.to_string_lossy();
        let output = self
            .run_tool("lp", &["-d", self.name.as_str(), "-t", title, "--", &*path])
            .await?;

        parse_request_id(&output).ok_or_else(|| PrinterError::UnexpectedOutput {
            tool: "lp".to_string(),
            output: output.trim().to_string(),
        })
    }

    async fn is_active(&self, job: &JobId) -> Result<bool, PrinterError> {
        let output = self.run_tool("lpstat", &["-o", self.name.as_str()]).await?;
        Ok(lists_job(&output, job))
    }
}
