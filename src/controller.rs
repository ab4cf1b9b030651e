use log::{debug, error, info, warn};
use std::time::Duration;

use crate::config::{Config, Credentials};
use crate::dispatcher::Dispatcher;
use crate::email::{CycleReport, MailConnector, MailSession};
use crate::error::MailError;
use crate::printer::Printer;
use crate::reporter::ErrorState;

/// Where a cycle currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    LoggingIn,
    Fetching,
    Dispatching,
    Retrying,
    Failed,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Done,
    /// `fatal` is set for authentication failures, which end the whole pass.
    Failed { fatal: bool },
}

/// Runs fetch/dispatch cycles with a bounded retry on transient transport
/// failures. Recurrence beyond the configured follow-up cycles is left to an
/// external scheduler.
pub struct IterationController<C: MailConnector, P: Printer> {
    connector: C,
    credentials: Credentials,
    dispatcher: Dispatcher<P>,
    errors: ErrorState,
    state: CycleState,
    retry_budget: u32,
    follow_up_cycles: u32,
    cycle_spacing: Duration,
}

impl<C: MailConnector, P: Printer> IterationController<C, P> {
    pub fn new(
        connector: C,
        credentials: Credentials,
        dispatcher: Dispatcher<P>,
        config: &Config,
    ) -> Self {
        IterationController {
            connector,
            credentials,
            dispatcher,
            errors: ErrorState::new(config.token_path.clone()),
            state: CycleState::Idle,
            retry_budget: config.retry_budget,
            follow_up_cycles: config.follow_up_cycles,
            cycle_spacing: config.cycle_spacing(),
        }
    }

    pub fn error_state(&self) -> &ErrorState {
        &self.errors
    }

    /// State the last cycle ended in
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Only run the initial cycle
    pub fn single_cycle(mut self) -> Self {
        self.follow_up_cycles = 0;
        self
    }

    /// Reset staging, connect the printer, then run the initial cycle and
    /// its follow-ups. Returns true when the error state was raised.
    pub async fn run_pass(&mut self) -> bool {
        if !self.dispatcher.is_dry_run() {
            let queue = self.dispatcher.queue();
            if let Err(e) = queue.reset_staging() {
                self.errors.raise(format!("staging reset: {}", e));
            }
            if let Err(e) = queue.connect().await {
                self.errors.raise(format!("printer connection: {}", e));
            }
        }

        let reports = self.run_cycles().await;
        info!(
            "Pass complete: {} cycle(s), {} message(s) dispatched",
            reports.len(),
            reports.iter().map(|(_, r)| r.dispatched).sum::<usize>()
        );
        self.errors.is_raised()
    }

    /// Initial cycle plus the follow-ups, `cycle_spacing` apart. An
    /// authentication failure stops the remaining cycles.
    pub async fn run_cycles(&mut self) -> Vec<(CycleOutcome, CycleReport)> {
        let mut reports = Vec::new();
        for index in 0..=self.follow_up_cycles {
            if index > 0 {
                debug!("Next cycle in {:?}", self.cycle_spacing);
                tokio::time::sleep(self.cycle_spacing).await;
            }

            let (outcome, report) = self.run_cycle().await;
            reports.push((outcome, report));
            if outcome == (CycleOutcome::Failed { fatal: true }) {
                warn!("Authentication failed, skipping the remaining cycles");
                break;
            }
        }
        reports
    }

    /// One fetch/dispatch cycle. Each attempt gets a fresh session that is
    /// logged out before the next attempt starts.
    pub async fn run_cycle(&mut self) -> (CycleOutcome, CycleReport) {
        let mut report = CycleReport::default();
        let mut budget = self.retry_budget;
        self.state = CycleState::Idle;
        self.dispatcher.begin_cycle();
        info!("Iterating at {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));

        if !self.dispatcher.is_dry_run() {
            if let Err(e) = self.dispatcher.queue().prepare().await {
                self.errors.raise(format!("printer preparation: {}", e));
            }
        }

        loop {
            self.transition(CycleState::LoggingIn);
            report.attempts += 1;

            let login = self.connector.login(&self.credentials).await;
            let attempt = match login {
                Ok(mut session) => {
                    let result = self.dispatch_contacts(&mut session, &mut report).await;
                    session.logout().await;
                    result
                }
                Err(e) => Err(e),
            };

            match attempt {
                Ok(()) => {
                    self.transition(CycleState::Done);
                    info!(
                        "✅ Cycle done: {} fetched, {} dispatched, {} ignored, {} failed command(s), {} print job(s)",
                        report.fetched,
                        report.dispatched,
                        report.ignored,
                        report.commands_failed,
                        report.print_jobs
                    );
                    return (CycleOutcome::Done, report);
                }
                Err(e) if e.is_transient() && budget > 0 => {
                    budget -= 1;
                    self.transition(CycleState::Retrying);
                    warn!("{} - retrying ({} retries left)", e, budget);
                }
                Err(e) => {
                    self.transition(CycleState::Failed);
                    let fatal = e.is_auth();
                    error!("❌ Cycle failed after {} attempt(s): {}", report.attempts, e);
                    self.errors.raise(e.to_string());
                    return (CycleOutcome::Failed { fatal }, report);
                }
            }
        }
    }

    async fn dispatch_contacts<S: MailSession>(
        &mut self,
        session: &mut S,
        report: &mut CycleReport,
    ) -> Result<(), MailError> {
        for contact in &self.credentials.contacts {
            transition(&mut self.state, CycleState::Fetching);
            let messages = self.dispatcher.fetch(session, contact, report).await?;

            transition(&mut self.state, CycleState::Dispatching);
            self.dispatcher
                .dispatch_all(session, contact, messages, &mut self.errors, report)
                .await?;
        }
        Ok(())
    }

    fn transition(&mut self, next: CycleState) {
        transition(&mut self.state, next);
    }
}

fn transition(state: &mut CycleState, next: CycleState) {
    debug!("Cycle state {:?} -> {:?}", state, next);
    *state = next;
}
