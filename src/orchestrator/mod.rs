//! Account orchestrator
//!
//! Runs the vote schedulers: one independent task per account in concurrent
//! mode, or a single shared cycle over all accounts in sequential mode.
//! Aggregates attempt results, retires exhausted accounts, and shuts
//! everything down cooperatively on cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eyre::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::VotingService;
use crate::config::ExecutionMode;
use crate::domain::{Account, CycleSummary, VoteAttemptResult};
use crate::scheduler::{SchedulerConfig, SchedulerOutcome, VoteScheduler};
use crate::window::{WindowState, classify, format_duration};

/// Sleep slice for orchestrator-level waits.
const SLEEP_SLICE: Duration = Duration::from_secs(30);

/// Drives N vote schedulers until cancelled.
pub struct Orchestrator {
    service: Arc<dyn VotingService>,
    config: SchedulerConfig,
    cancel: CancellationToken,
    shutdown_grace: Duration,
}

impl Orchestrator {
    pub fn new(
        service: Arc<dyn VotingService>,
        config: SchedulerConfig,
        cancel: CancellationToken,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            service,
            config,
            cancel,
            shutdown_grace,
        }
    }

    /// Run until cancelled (or until every account is retired).
    pub async fn run(&self, accounts: Vec<Account>, mode: ExecutionMode) -> Result<()> {
        info!(accounts = accounts.len(), %mode, "orchestrator starting");

        match mode {
            ExecutionMode::Concurrent => self.run_concurrent(accounts).await,
            ExecutionMode::Sequential => self.run_sequential(accounts).await,
        }
    }

    /// One independent scheduler task per account.
    async fn run_concurrent(&self, accounts: Vec<Account>) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<VoteAttemptResult>(64);
        let mut tasks: Vec<(usize, JoinHandle<SchedulerOutcome>)> = Vec::new();

        for account in accounts {
            let index = account.index;
            let scheduler = VoteScheduler::new(
                account,
                self.service.clone(),
                self.config.clone(),
                self.cancel.child_token(),
            )
            .with_results(tx.clone());

            tasks.push((index, tokio::spawn(scheduler.run())));
        }

        // Only the schedulers hold senders now; recv returns None once every
        // scheduler has finished.
        drop(tx);

        let mut totals = CycleSummary::default();
        totals.active_accounts = tasks.len();

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(result) => totals.record(&result),
                    None => {
                        info!("all schedulers finished");
                        break;
                    }
                },
                _ = self.cancel.cancelled() => break,
            }
        }

        self.shutdown(tasks).await;

        info!(
            succeeded = totals.succeeded,
            failed = totals.failed,
            skipped = totals.skipped,
            fuel_spent = totals.fuel_spent,
            "session totals"
        );

        Ok(())
    }

    /// One pass over all accounts against the current window, then return.
    ///
    /// Backs the single-vote command: no waiting for a pending window, no
    /// cooldown afterwards.
    pub async fn vote_once(&self, accounts: Vec<Account>) -> Result<CycleSummary> {
        let mut schedulers: Vec<VoteScheduler> = accounts
            .into_iter()
            .map(|account| {
                VoteScheduler::new(
                    account,
                    self.service.clone(),
                    self.config.clone(),
                    self.cancel.child_token(),
                )
            })
            .collect();

        let mut summary = CycleSummary::new(1, schedulers.len());
        if schedulers.is_empty() {
            return Ok(summary);
        }

        let Some(m) = schedulers[0]
            .fetch_match()
            .await
            .map_err(|e| eyre::eyre!("match fetch failed: {}", e))?
        else {
            info!("no active match");
            return Ok(summary);
        };

        let state = classify(&m, Utc::now());
        if !state.is_open() {
            info!(match_id = %m.id, "voting window is {}", state);
            return Ok(summary);
        }

        for scheduler in &mut schedulers {
            let result = scheduler.vote_on(&m).await;
            log_attempt(scheduler.account().index, &result);
            summary.record(&result);
        }
        summary.fuel_remaining = schedulers
            .iter()
            .map(|s| u64::from(s.account().fuel_balance))
            .sum();

        Ok(summary)
    }

    /// Wait for schedulers to stop within the grace period, then abort the
    /// rest. Never deadlocks on a unit that refuses to stop.
    async fn shutdown(&self, tasks: Vec<(usize, JoinHandle<SchedulerOutcome>)>) {
        self.cancel.cancel();

        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        while tasks.iter().any(|(_, handle)| !handle.is_finished())
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        for (index, handle) in tasks {
            if handle.is_finished() {
                match handle.await {
                    Ok(SchedulerOutcome::Stopped { cycles }) => {
                        info!(account = index, cycles, "scheduler stopped");
                    }
                    Ok(SchedulerOutcome::Exhausted { cycles }) => {
                        info!(account = index, cycles, "scheduler retired (out of fuel)");
                    }
                    Err(e) => error!(account = index, error = %e, "scheduler task panicked"),
                }
            } else {
                warn!(account = index, "scheduler did not stop within grace period, aborting");
                handle.abort();
            }
        }
    }

    /// One shared cycle: all accounts vote on the same window, then the loop
    /// waits for the window to close before re-polling.
    async fn run_sequential(&self, accounts: Vec<Account>) -> Result<()> {
        let mut schedulers: Vec<VoteScheduler> = accounts
            .into_iter()
            .map(|account| {
                VoteScheduler::new(
                    account,
                    self.service.clone(),
                    self.config.clone(),
                    self.cancel.child_token(),
                )
            })
            .collect();

        let mut cycle: u64 = 0;
        let mut error_streak: u32 = 0;

        while !self.cancel.is_cancelled() {
            if schedulers.is_empty() {
                info!("no accounts with fuel remaining");
                break;
            }

            let m = match schedulers[0].fetch_match().await {
                Ok(Some(m)) => {
                    error_streak = 0;
                    m
                }
                Ok(None) => {
                    debug!("no active match");
                    if !self.backoff_sleep(&mut error_streak).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "match fetch failed");
                    if !self.backoff_sleep(&mut error_streak).await {
                        break;
                    }
                    continue;
                }
            };

            match classify(&m, Utc::now()) {
                WindowState::Pending(wait) => {
                    debug!(match_id = %m.id, "voting opens in {}", format_duration(wait));
                    if !self.sleep_cancellable(wait.min(SLEEP_SLICE)).await {
                        break;
                    }
                }
                WindowState::Unknown => {
                    debug!(match_id = %m.id, "window timing unknown");
                    if !self.sleep_cancellable(self.config.unknown_retry).await {
                        break;
                    }
                }
                WindowState::Closed => {
                    debug!(match_id = %m.id, "window closed, waiting for next match");
                    if !self.sleep_cancellable(self.config.poll_interval).await {
                        break;
                    }
                }
                WindowState::Open(remaining) => {
                    cycle += 1;
                    info!(
                        cycle,
                        match_id = %m.id,
                        accounts = schedulers.len(),
                        "voting window open, {} remaining",
                        format_duration(remaining)
                    );

                    let mut summary = CycleSummary::new(cycle, schedulers.len());

                    for scheduler in &mut schedulers {
                        if self.cancel.is_cancelled() {
                            break;
                        }

                        let delay = scheduler.jitter_delay();
                        if !delay.is_zero() && !scheduler.sleep_spanning(delay).await {
                            break;
                        }

                        // The per-account delay may have consumed the window.
                        if !classify(&m, Utc::now()).is_open() {
                            warn!(match_id = %m.id, "window closed mid-cycle");
                            break;
                        }

                        let result = scheduler.vote_on(&m).await;
                        log_attempt(scheduler.account().index, &result);
                        summary.record(&result);
                    }

                    schedulers.retain(|s| {
                        if s.is_exhausted() {
                            warn!(account = %s.account().label(), "account out of fuel, retiring");
                            false
                        } else {
                            true
                        }
                    });
                    summary.active_accounts = schedulers.len();
                    summary.fuel_remaining = schedulers
                        .iter()
                        .map(|s| u64::from(s.account().fuel_balance))
                        .sum();

                    println!("{}", summary.render());

                    if !self.wait_until_close(&m).await {
                        break;
                    }
                }
            }
        }

        info!(cycles = cycle, "orchestrator stopped");
        Ok(())
    }

    /// Sleep until the match's window closes, in cancellable slices.
    async fn wait_until_close(&self, m: &crate::domain::Match) -> bool {
        loop {
            match classify(m, Utc::now()) {
                WindowState::Open(remaining) | WindowState::Pending(remaining) => {
                    let slice = remaining.min(SLEEP_SLICE).max(Duration::from_millis(250));
                    if !self.sleep_cancellable(slice).await {
                        return false;
                    }
                }
                WindowState::Closed => return true,
                WindowState::Unknown => {
                    return self.sleep_cancellable(self.config.unknown_retry).await;
                }
            }
        }
    }

    async fn backoff_sleep(&self, error_streak: &mut u32) -> bool {
        let delay = self.config.error_backoff.delay(*error_streak);
        *error_streak = error_streak.saturating_add(1);
        debug!("backing off {}", format_duration(delay));
        self.sleep_cancellable(delay).await
    }

    async fn sleep_cancellable(&self, dur: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(dur) => true,
        }
    }
}

fn log_attempt(account_index: usize, result: &VoteAttemptResult) {
    if result.success {
        info!(
            account = account_index,
            match_id = %result.match_id,
            fuel_spent = result.fuel_spent,
            "vote submitted"
        );
    } else if result.is_skip() {
        info!(account = account_index, match_id = %result.match_id, "insufficient fuel, skipped");
    } else {
        warn!(
            account = account_index,
            match_id = %result.match_id,
            error = ?result.error,
            "vote attempt failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::client::mock::MockVotingService;
    use crate::domain::{Side, SidePosition, SidePreference};
    use crate::strategy::FuelStrategy;

    fn open_match(id: &str, secs_until_close: i64) -> crate::domain::Match {
        let now = Utc::now();
        crate::domain::Match {
            id: id.to_string(),
            status: Some("live".to_string()),
            total_votes: 0,
            voting_start: Some(now - chrono::Duration::seconds(5)),
            voting_end: Some(now + chrono::Duration::seconds(secs_until_close)),
            sides: vec![
                Side {
                    id: "side-a".to_string(),
                    position: Some(SidePosition::First),
                    win_probability: 40,
                    vote_count: 0,
                    fuel_points: 0,
                    owner: None,
                },
                Side {
                    id: "side-b".to_string(),
                    position: Some(SidePosition::Second),
                    win_probability: 60,
                    vote_count: 0,
                    fuel_points: 0,
                    owner: None,
                },
            ],
        }
    }

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            strategy: FuelStrategy::Conservative { min: 1 },
            delay_min: Duration::from_millis(1),
            delay_max: Duration::from_millis(5),
            poll_interval: Duration::from_millis(20),
            unknown_retry: Duration::from_millis(20),
            max_next_match_wait: Duration::from_millis(100),
            error_backoff: BackoffPolicy {
                initial_secs: 1,
                max_secs: 1,
            },
            exhausted_cycles: 1,
        }
    }

    #[tokio::test]
    async fn test_sequential_cycle_votes_every_account() {
        let service = Arc::new(MockVotingService::new());
        service.set_match(Some(open_match("m-1", 2)));
        // Mock assigns fids 1000 and 1001 in credential order.
        service.set_balance(1000, 5);
        service.set_balance(1001, 5);

        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(
            service.clone(),
            test_config(),
            cancel.clone(),
            Duration::from_secs(1),
        );

        let accounts = vec![
            Account::new(1, "token-1", SidePreference::Auto),
            Account::new(2, "token-2", SidePreference::Auto),
        ];

        let handle = tokio::spawn(async move { orchestrator.run(accounts, ExecutionMode::Sequential).await });

        tokio::time::sleep(Duration::from_millis(1000)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("orchestrator should stop promptly")
            .unwrap()
            .unwrap();

        let votes = service.submitted_votes();
        assert_eq!(votes.len(), 2);
        assert!(votes.iter().any(|v| v.fid == 1000));
        assert!(votes.iter().any(|v| v.fid == 1001));
    }

    #[tokio::test]
    async fn test_sequential_retires_fuelless_accounts() {
        let service = Arc::new(MockVotingService::new());
        service.set_match(Some(open_match("m-1", 1)));
        // Neither account has fuel; with exhausted-cycles = 1 both retire
        // after the first pass and the orchestrator finishes on its own.
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(
            service.clone(),
            test_config(),
            cancel.clone(),
            Duration::from_secs(1),
        );

        let accounts = vec![
            Account::new(1, "token-1", SidePreference::Auto),
            Account::new(2, "token-2", SidePreference::Auto),
        ];

        tokio::time::timeout(
            Duration::from_secs(10),
            orchestrator.run(accounts, ExecutionMode::Sequential),
        )
        .await
        .expect("orchestrator should finish once all accounts retire")
        .unwrap();

        assert!(service.submitted_votes().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_mode_stops_on_cancel() {
        let service = Arc::new(MockVotingService::new());
        service.set_match(Some(open_match("m-1", 60)));
        service.set_balance(1000, 3);
        service.set_balance(1001, 3);

        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(
            service.clone(),
            test_config(),
            cancel.clone(),
            Duration::from_secs(2),
        );

        let accounts = vec![
            Account::new(1, "token-1", SidePreference::Auto),
            Account::new(2, "token-2", SidePreference::Auto),
        ];

        let handle = tokio::spawn(async move { orchestrator.run(accounts, ExecutionMode::Concurrent).await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("orchestrator should stop promptly")
            .unwrap()
            .unwrap();

        // Both accounts voted exactly once before cancellation.
        let votes = service.submitted_votes();
        assert_eq!(votes.len(), 2);
    }
}
