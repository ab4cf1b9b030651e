use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;

use mailbot::command::CommandExecutor;
use mailbot::config::{Config, Credentials};
use mailbot::controller::IterationController;
use mailbot::dispatcher::Dispatcher;
use mailbot::email::{ImapConnector, SmtpOutbox};
use mailbot::printer::{CupsPrinter, PrintJobQueue};
use mailbot::reporter::{write_token, ErrorReporter, ReportOutcome, STATUS_ERROR};

#[derive(Parser, Clone, Copy)]
#[command(name = "mailbot")]
#[command(about = "Mailbox agent: runs [cmd] mails, answers [ping], prints [bot] mails")]
#[command(version = "0.1.0")]
struct Args {
    /// Run a single cycle, without the follow-up cycles
    #[arg(long)]
    once: bool,

    /// Log in, fetch and classify, then show what would be done
    #[arg(short, long)]
    dry_run: bool,

    /// Print the files left in the staging directory
    #[arg(long, conflicts_with_all = ["report", "daemon"])]
    print_pending: bool,

    /// Mail the logs to every contact if the error token is present
    #[arg(long, conflicts_with = "daemon")]
    report: bool,

    /// Run polling passes on the configured cron schedule
    #[arg(long)]
    daemon: bool,

    /// Print the resolved configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let config = Config::new()?;

    if args.check_config {
        print_config(&config);
        return Ok(ExitCode::SUCCESS);
    }

    if args.report {
        init_logging(None)?;
        return run_report(&config).await;
    }

    if args.print_pending {
        init_logging(Some(&config.printer_log_path))?;
        return run_print_pending(&config).await;
    }

    init_logging(Some(&config.mail_log_path))?;
    if args.daemon {
        info!("🔄 Starting in daemon mode");
        run_daemon_mode(config, args).await?;
        return Ok(ExitCode::SUCCESS);
    }

    if args.dry_run {
        info!("🧪 Starting mailbot in dry-run mode");
    } else {
        info!("🚀 Starting mailbot");
    }

    match run_polling_pass(&config, args).await {
        Ok(false) => Ok(ExitCode::SUCCESS),
        Ok(true) => {
            error!("❌ Polling pass ended in error state");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!("❌ Polling pass aborted: {:#}", e);
            mark_failed(&config);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Send log output to `path` in append mode, or to stderr when `None`.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("mailbot=debug"));

    if let Some(path) = path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Unable to create log directory {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Unable to open log file {:?}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn print_config(config: &Config) {
    println!("✅ Configuration valid!");
    println!("📧 IMAP: {}:{}", config.imap_host, config.imap_port);
    println!("📤 SMTP: {}:{}", config.smtp_host, config.smtp_port);
    println!("🔑 Credentials: {:?}", config.credentials_path);
    match Credentials::load(&config.credentials_path) {
        Ok(credentials) => {
            println!("👤 Account: {}", credentials.account);
            println!("📇 Contacts: {}", credentials.contacts.join(", "));
        }
        Err(e) => println!("⚠️  {}", e),
    }
    println!("🖨️  Printer: {} (policy {})", config.printer_name, config.printer_error_policy);
    println!("📁 Staging directory: {:?}", config.print_dir);
    println!("🚩 Error token: {:?}", config.token_path);
    println!("📝 Logs: {:?}, {:?}", config.mail_log_path, config.printer_log_path);
    println!(
        "🔁 Retry budget {}, {} follow-up cycle(s) every {}s",
        config.retry_budget, config.follow_up_cycles, config.cycle_spacing_secs
    );
    println!("📆 Daemon schedule: {}", config.scheduler_cron);
}

fn mark_failed(config: &Config) {
    if let Err(e) = write_token(&config.token_path, STATUS_ERROR) {
        error!("Unable to write error token {:?}: {}", config.token_path, e);
    }
}

fn build_controller(
    config: &Config,
    credentials: Credentials,
    args: Args,
) -> IterationController<ImapConnector, CupsPrinter> {
    let queue = PrintJobQueue::new(CupsPrinter::new(&config.printer_name), config);
    let mut dispatcher = Dispatcher::new(CommandExecutor::default(), queue);
    if args.dry_run {
        dispatcher = dispatcher.dry_run();
    }

    let controller =
        IterationController::new(ImapConnector::new(config), credentials, dispatcher, config);
    if args.once || args.dry_run {
        controller.single_cycle()
    } else {
        controller
    }
}

/// Returns true when the pass ended with the error state raised.
async fn run_polling_pass(config: &Config, args: Args) -> Result<bool> {
    let credentials = Credentials::load(&config.credentials_path)?;
    info!("Loaded {} contact(s)", credentials.contacts.len());

    let mut controller = build_controller(config, credentials, args);
    let failed = controller.run_pass().await;
    if let Some(cause) = controller.error_state().cause() {
        warn!("First error of this pass: {}", cause);
    }
    Ok(failed)
}

async fn run_print_pending(config: &Config) -> Result<ExitCode> {
    info!("🖨️  Starting pending-print pass");
    let queue = PrintJobQueue::new(CupsPrinter::new(&config.printer_name), config);

    let result = match queue.connect().await {
        Ok(()) => queue.print_pending().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(count) => {
            info!("✅ Pending-print pass done, {} file(s) printed", count);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("❌ Pending-print pass failed: {}", e);
            mark_failed(config);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_report(config: &Config) -> Result<ExitCode> {
    let credentials = Credentials::load(&config.credentials_path)?;
    let reporter = ErrorReporter::new(config, &credentials);
    if reporter.pending_status()?.is_none() {
        info!("No error token, nothing to report");
        return Ok(ExitCode::SUCCESS);
    }

    let outbox = SmtpOutbox::new(config, &credentials)?;
    match reporter.report(&outbox).await {
        Ok(ReportOutcome::NothingToReport) => Ok(ExitCode::SUCCESS),
        Ok(ReportOutcome::Sent { logs_attached }) => {
            info!("✅ Error report sent with {} log(s)", logs_attached);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("❌ Error report not sent: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_daemon_mode(config: Config, args: Args) -> Result<()> {
    use chrono::{Local, Timelike};
    use tokio_cron_scheduler::{Job, JobScheduler};

    let credentials = Credentials::load(&config.credentials_path)?;
    let scheduler = JobScheduler::new().await?;

    info!("📆 Adding scheduled polling pass (cron: {})", config.scheduler_cron);
    let cron_expr = config.scheduler_cron.clone();
    let job_config = config.clone();
    let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
        let config = job_config.clone();
        let credentials = credentials.clone();

        Box::pin(async move {
            info!("⏰ Scheduled polling pass starting");
            let mut controller = build_controller(&config, credentials, args);
            if controller.run_pass().await {
                error!("❌ Scheduled polling pass ended in error state");
            } else {
                info!("✅ Scheduled polling pass done");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("✅ Daemon started, waiting for the next scheduled pass");
    info!("⏸️  Press Ctrl+C to stop the daemon");

    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;

        let now = Local::now();
        if now.minute() == 0 {
            info!("💓 Daemon alive - {}", now.format("%Y-%m-%d %H:%M"));
        }
    }
}
