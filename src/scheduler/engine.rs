//! VoteScheduler - per-account voting state machine
//!
//! One scheduler owns one account and loops through the match lifecycle:
//! fetch the current match, wait for its voting window, vote once, cool down
//! until the window closes, then seek the next match. Every external failure
//! degrades to a bounded sleep and a retry; the only terminal conditions are
//! cancellation and fuel exhaustion.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ServiceError, VoteRequest, VotingService};
use crate::domain::{Account, Match, VoteAttemptResult, VoteErrorKind, select_side};
use crate::window::{WindowState, classify, format_duration};

use super::SchedulerConfig;

/// No single sleep exceeds this; cancellation is checked at every slice.
const MAX_SLEEP_SLICE: Duration = Duration::from_secs(30);

/// Why a scheduler returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerOutcome {
    /// Cancellation was requested
    Stopped { cycles: u64 },
    /// The account ran out of fuel across consecutive cycles
    Exhausted { cycles: u64 },
}

/// States of the per-account machine.
enum State {
    Idle,
    AwaitingWindow(Match),
    Voting(Match),
    CooldownUntilClose(Match),
    SeekingNextMatch,
}

enum Transition {
    To(State),
    Cancelled,
    Exhausted,
}

/// Per-account vote scheduler.
pub struct VoteScheduler {
    account: Account,
    service: Arc<dyn VotingService>,
    config: SchedulerConfig,
    cancel: CancellationToken,
    results: Option<mpsc::Sender<VoteAttemptResult>>,

    /// Independently seeded so jitter is decorrelated across accounts
    rng: StdRng,

    /// Last match id this scheduler voted on or watched close
    last_match_id: Option<String>,

    /// The inaugural vote goes out without jitter
    voted_once: bool,

    zero_fuel_cycles: u32,
    error_streak: u32,
    cycles: u64,
}

impl VoteScheduler {
    pub fn new(
        account: Account,
        service: Arc<dyn VotingService>,
        config: SchedulerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            account,
            service,
            config,
            cancel,
            results: None,
            rng: StdRng::from_os_rng(),
            last_match_id: None,
            voted_once: false,
            zero_fuel_cycles: 0,
            error_streak: 0,
            cycles: 0,
        }
    }

    /// Send every attempt result to this channel in addition to logging it.
    pub fn with_results(mut self, tx: mpsc::Sender<VoteAttemptResult>) -> Self {
        self.results = Some(tx);
        self
    }

    /// Deterministic jitter for tests.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Run until cancelled or the account is out of fuel.
    pub async fn run(mut self) -> SchedulerOutcome {
        info!(account = %self.account.label(), "vote scheduler starting");

        let mut state = State::Idle;
        loop {
            if self.cancel.is_cancelled() {
                info!(account = %self.account.label(), "vote scheduler stopping");
                return SchedulerOutcome::Stopped { cycles: self.cycles };
            }

            let transition = match state {
                State::Idle => self.fetch_current().await,
                State::AwaitingWindow(m) => self.await_window(m).await,
                State::Voting(m) => self.voting(m).await,
                State::CooldownUntilClose(m) => self.cooldown(m).await,
                State::SeekingNextMatch => self.seek_next().await,
            };

            state = match transition {
                Transition::To(next) => next,
                Transition::Cancelled => {
                    info!(account = %self.account.label(), "vote scheduler stopping");
                    return SchedulerOutcome::Stopped { cycles: self.cycles };
                }
                Transition::Exhausted => {
                    warn!(
                        account = %self.account.label(),
                        cycles = self.zero_fuel_cycles,
                        "account out of fuel, retiring"
                    );
                    return SchedulerOutcome::Exhausted { cycles: self.cycles };
                }
            };
        }
    }

    /// Idle: fetch the current match, backing off on failure.
    async fn fetch_current(&mut self) -> Transition {
        match self.fetch_match().await {
            Ok(Some(m)) => {
                self.error_streak = 0;
                Transition::To(State::AwaitingWindow(m))
            }
            Ok(None) => {
                debug!(account = %self.account.label(), "no active match");
                self.backoff_then(State::SeekingNextMatch).await
            }
            Err(e) => {
                warn!(account = %self.account.label(), error = %e, "match fetch failed");
                self.backoff_then(State::SeekingNextMatch).await
            }
        }
    }

    /// AwaitingWindow: classify and either wait, vote, or move on.
    async fn await_window(&mut self, m: Match) -> Transition {
        match classify(&m, Utc::now()) {
            WindowState::Pending(wait) => {
                debug!(
                    account = %self.account.label(),
                    match_id = %m.id,
                    "voting opens in {}",
                    format_duration(wait)
                );
                if !self.sleep_cancellable(wait.min(MAX_SLEEP_SLICE)).await {
                    return Transition::Cancelled;
                }
                // Re-fetch rather than trusting the held match across a sleep.
                Transition::To(State::Idle)
            }
            WindowState::Open(remaining) => {
                debug!(
                    account = %self.account.label(),
                    match_id = %m.id,
                    "voting window open, {} remaining",
                    format_duration(remaining)
                );

                let delay = self.jitter_delay();
                if !delay.is_zero() {
                    debug!(
                        account = %self.account.label(),
                        "pre-vote delay {}",
                        format_duration(delay)
                    );
                    if !self.sleep_spanning(delay).await {
                        return Transition::Cancelled;
                    }
                }

                // The delay may have outlived the window or the match itself.
                match self.fetch_match().await {
                    Ok(Some(fresh)) if fresh.id != m.id => Transition::To(State::AwaitingWindow(fresh)),
                    Ok(Some(fresh)) => {
                        if classify(&fresh, Utc::now()).is_open() {
                            Transition::To(State::Voting(fresh))
                        } else {
                            self.record(VoteAttemptResult::failed(
                                self.account.index,
                                fresh.id.clone(),
                                VoteErrorKind::WindowClosed,
                            ))
                            .await;
                            self.last_match_id = Some(fresh.id);
                            Transition::To(State::SeekingNextMatch)
                        }
                    }
                    Ok(None) => Transition::To(State::Idle),
                    Err(e) => {
                        warn!(account = %self.account.label(), error = %e, "re-check fetch failed");
                        Transition::To(State::Idle)
                    }
                }
            }
            WindowState::Closed => {
                self.last_match_id = Some(m.id);
                Transition::To(State::SeekingNextMatch)
            }
            WindowState::Unknown => {
                debug!(account = %self.account.label(), match_id = %m.id, "window timing unknown");
                if !self.sleep_cancellable(self.config.unknown_retry).await {
                    return Transition::Cancelled;
                }
                Transition::To(State::Idle)
            }
        }
    }

    /// Voting: spend fuel on the selected side, then cool down.
    async fn voting(&mut self, m: Match) -> Transition {
        let result = self.vote_on(&m).await;
        let exhausted = self.is_exhausted();
        self.record(result).await;
        self.last_match_id = Some(m.id.clone());

        if exhausted {
            Transition::Exhausted
        } else {
            Transition::To(State::CooldownUntilClose(m))
        }
    }

    /// One vote attempt against a match whose window is open.
    ///
    /// Shared with the sequential orchestrator, which drives the window
    /// waiting itself and calls this per account.
    pub(crate) async fn vote_on(&mut self, m: &Match) -> VoteAttemptResult {
        self.cycles += 1;

        let fid = match self.ensure_identity().await {
            Ok(fid) => fid,
            Err(e) => {
                return VoteAttemptResult::failed(
                    self.account.index,
                    m.id.clone(),
                    VoteErrorKind::Remote(e.to_string()),
                );
            }
        };

        // An out-of-band reward may top the balance up; failure is non-fatal.
        match self.service.claim_fuel_reward(&self.account.credential, fid).await {
            Ok(granted) if granted > 0 => {
                info!(account = %self.account.label(), granted, "claimed fuel reward");
            }
            Ok(_) => {}
            Err(e) => debug!(account = %self.account.label(), error = %e, "fuel reward claim failed"),
        }

        // Balance is refreshed here, never trusted across a sleep boundary.
        let balance = match self.service.fuel_balance(&self.account.credential, fid).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(account = %self.account.label(), error = %e, "balance check failed, treating as 0");
                0
            }
        };
        self.account.fuel_balance = balance;

        if balance == 0 {
            self.zero_fuel_cycles += 1;
        } else {
            self.zero_fuel_cycles = 0;
        }

        let Some(fuel_points) = self.config.strategy.fuel_to_spend(balance) else {
            return VoteAttemptResult::failed(self.account.index, m.id.clone(), VoteErrorKind::InsufficientFuel);
        };

        let Some(side) = select_side(m, self.account.side_preference) else {
            return VoteAttemptResult::failed(self.account.index, m.id.clone(), VoteErrorKind::NoSides);
        };

        debug!(
            account = %self.account.label(),
            match_id = %m.id,
            side_id = %side.id,
            win_probability = side.win_probability,
            fuel_points,
            "selected side"
        );

        let request = VoteRequest {
            fid,
            match_id: m.id.clone(),
            side_id: side.id.clone(),
            fuel_points,
        };

        match self.service.submit_vote(&self.account.credential, &request).await {
            Ok(receipt) => {
                if let Some(message) = receipt.message {
                    debug!(account = %self.account.label(), %message, "vote acknowledged");
                }
                self.voted_once = true;
                self.account.fuel_balance = balance.saturating_sub(fuel_points);
                VoteAttemptResult::voted(self.account.index, m.id.clone(), side.id.clone(), fuel_points)
            }
            Err(e) => VoteAttemptResult::failed(self.account.index, m.id.clone(), VoteErrorKind::Remote(e.to_string())),
        }
    }

    /// CooldownUntilClose: sleep until the window closes.
    async fn cooldown(&mut self, m: Match) -> Transition {
        if let WindowState::Open(remaining) = classify(&m, Utc::now()) {
            debug!(
                account = %self.account.label(),
                match_id = %m.id,
                "cooling down, window closes in {}",
                format_duration(remaining)
            );
        }

        loop {
            match classify(&m, Utc::now()) {
                WindowState::Open(remaining) | WindowState::Pending(remaining) => {
                    let slice = remaining.min(MAX_SLEEP_SLICE).max(Duration::from_millis(250));
                    if !self.sleep_cancellable(slice).await {
                        return Transition::Cancelled;
                    }
                }
                WindowState::Closed => break,
                WindowState::Unknown => {
                    if !self.sleep_cancellable(self.config.unknown_retry).await {
                        return Transition::Cancelled;
                    }
                    break;
                }
            }
        }

        self.last_match_id = Some(m.id);
        Transition::To(State::SeekingNextMatch)
    }

    /// SeekingNextMatch: poll for a match with a new id, bounded in time.
    async fn seek_next(&mut self) -> Transition {
        let deadline = tokio::time::Instant::now() + self.config.max_next_match_wait;

        loop {
            if self.cancel.is_cancelled() {
                return Transition::Cancelled;
            }

            match self.fetch_match().await {
                Ok(Some(m)) if self.last_match_id.as_deref() != Some(m.id.as_str()) => {
                    info!(account = %self.account.label(), match_id = %m.id, "found next match");
                    self.error_streak = 0;
                    return Transition::To(State::AwaitingWindow(m));
                }
                Ok(_) => debug!(account = %self.account.label(), "no new match yet"),
                Err(e) => warn!(account = %self.account.label(), error = %e, "match poll failed"),
            }

            if tokio::time::Instant::now() >= deadline {
                info!(account = %self.account.label(), "no new match within the polling window, backing off");
                return self.backoff_then(State::Idle).await;
            }

            if !self.sleep_cancellable(self.config.poll_interval).await {
                return Transition::Cancelled;
            }
        }
    }

    pub(crate) async fn fetch_match(&mut self) -> Result<Option<Match>, ServiceError> {
        let fid = self.ensure_identity().await?;
        self.service.current_match(fid).await
    }

    /// Resolve and cache the account's remote identity.
    async fn ensure_identity(&mut self) -> Result<u64, ServiceError> {
        if let Some(fid) = self.account.fid {
            return Ok(fid);
        }

        let identity = self.service.resolve_identity(&self.account.credential).await?;
        info!(
            account = self.account.index,
            fid = identity.fid,
            username = ?identity.username,
            "resolved account identity"
        );
        self.account.fid = Some(identity.fid);
        self.account.username = identity.username;
        Ok(identity.fid)
    }

    /// Pre-vote delay: zero for the inaugural vote, uniform random within the
    /// configured range afterwards.
    pub(crate) fn jitter_delay(&mut self) -> Duration {
        if !self.voted_once {
            return Duration::ZERO;
        }

        let min_ms = self.config.delay_min.as_millis() as u64;
        let max_ms = self.config.delay_max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }

        Duration::from_millis(self.rng.random_range(min_ms..=max_ms))
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.zero_fuel_cycles >= self.config.exhausted_cycles
    }

    async fn record(&mut self, result: VoteAttemptResult) {
        if result.success {
            info!(
                account = %self.account.label(),
                match_id = %result.match_id,
                side_id = ?result.side_id,
                fuel_spent = result.fuel_spent,
                "vote submitted"
            );
        } else if result.is_skip() {
            info!(
                account = %self.account.label(),
                match_id = %result.match_id,
                "insufficient fuel, skipping cycle"
            );
        } else {
            warn!(
                account = %self.account.label(),
                match_id = %result.match_id,
                error = ?result.error,
                "vote attempt failed"
            );
        }

        if let Some(tx) = &self.results {
            let _ = tx.send(result).await;
        }
    }

    /// Sleep on the error backoff, then transition.
    async fn backoff_then(&mut self, next: State) -> Transition {
        let delay = self.config.error_backoff.delay(self.error_streak);
        self.error_streak = self.error_streak.saturating_add(1);
        debug!(account = %self.account.label(), "backing off {}", format_duration(delay));

        if self.sleep_spanning(delay).await {
            Transition::To(next)
        } else {
            Transition::Cancelled
        }
    }

    /// Sleep for `dur`, returning false if cancelled first.
    async fn sleep_cancellable(&self, dur: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(dur) => true,
        }
    }

    /// Sleep in bounded slices so long waits stay responsive to cancellation.
    pub(crate) async fn sleep_spanning(&self, total: Duration) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            let slice = remaining.min(MAX_SLEEP_SLICE);
            if !self.sleep_cancellable(slice).await {
                return false;
            }
            remaining -= slice;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockVotingService;
    use crate::domain::{Side, SidePosition, SidePreference};
    use crate::strategy::FuelStrategy;

    fn open_match(id: &str, secs_until_close: i64) -> Match {
        let now = Utc::now();
        Match {
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
                    vote_count: 1,
                    fuel_points: 1,
                    owner: None,
                },
                Side {
                    id: "side-b".to_string(),
                    position: Some(SidePosition::Second),
                    win_probability: 65,
                    vote_count: 2,
                    fuel_points: 2,
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
            error_backoff: crate::backoff::BackoffPolicy {
                initial_secs: 1,
                max_secs: 1,
            },
            exhausted_cycles: 2,
        }
    }

    fn scheduler(service: Arc<MockVotingService>, config: SchedulerConfig) -> VoteScheduler {
        let account = Account::new(1, "token-1", SidePreference::Auto);
        VoteScheduler::new(account, service, config, CancellationToken::new()).with_rng_seed(7)
    }

    #[tokio::test]
    async fn test_vote_on_spends_strategy_amount() {
        let service = Arc::new(MockVotingService::new());
        let mut sched = scheduler(service.clone(), test_config());

        let m = open_match("m-1", 60);
        service.set_match(Some(m.clone()));
        service.set_balance(1000, 5);

        let result = sched.vote_on(&m).await;

        assert!(result.success);
        assert_eq!(result.fuel_spent, 1);
        // Auto preference ranks side-b (65%) above side-a (40%).
        assert_eq!(result.side_id.as_deref(), Some("side-b"));

        let votes = service.submitted_votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].fuel_points, 1);
        assert_eq!(votes[0].match_id, "m-1");
    }

    #[tokio::test]
    async fn test_vote_on_claims_reward_before_checking_balance() {
        let service = Arc::new(MockVotingService::new());
        let mut sched = scheduler(service.clone(), test_config());

        let m = open_match("m-1", 60);
        // No standing balance, but a pending claim covers the vote.
        service.set_balance(1000, 0);
        service.set_claim_grant(1000, 2);

        let result = sched.vote_on(&m).await;

        assert!(result.success);
        assert_eq!(result.fuel_spent, 1);
    }

    #[tokio::test]
    async fn test_vote_on_insufficient_fuel_is_a_skip() {
        let service = Arc::new(MockVotingService::new());
        let mut sched = scheduler(service.clone(), test_config());

        let m = open_match("m-1", 60);
        service.set_balance(1000, 0);

        let result = sched.vote_on(&m).await;

        assert!(!result.success);
        assert!(result.is_skip());
        assert!(service.submitted_votes().is_empty());
        assert!(!sched.is_exhausted());

        // A second dry cycle retires the account.
        let result = sched.vote_on(&m).await;
        assert!(result.is_skip());
        assert!(sched.is_exhausted());
    }

    #[tokio::test]
    async fn test_vote_on_surfaces_remote_rejection() {
        let service = Arc::new(MockVotingService::new());
        let mut sched = scheduler(service.clone(), test_config());

        let m = open_match("m-1", 60);
        service.set_balance(1000, 5);
        service.reject_votes("cannot powerup at this time");

        let result = sched.vote_on(&m).await;

        assert!(!result.success);
        assert!(matches!(result.error, Some(VoteErrorKind::Remote(ref msg)) if msg.contains("cannot powerup")));
    }

    #[tokio::test]
    async fn test_preference_is_respected() {
        let service = Arc::new(MockVotingService::new());
        let account = Account::new(1, "token-1", SidePreference::First);
        let mut sched =
            VoteScheduler::new(account, service.clone(), test_config(), CancellationToken::new()).with_rng_seed(7);

        let m = open_match("m-1", 60);
        service.set_balance(1000, 5);

        let result = sched.vote_on(&m).await;

        // First side wins despite the worse metrics.
        assert_eq!(result.side_id.as_deref(), Some("side-a"));
    }

    #[tokio::test]
    async fn test_jitter_is_zero_for_inaugural_vote_only() {
        let service = Arc::new(MockVotingService::new());
        let mut sched = scheduler(service.clone(), test_config());

        assert_eq!(sched.jitter_delay(), Duration::ZERO);

        let m = open_match("m-1", 60);
        service.set_balance(1000, 5);
        assert!(sched.vote_on(&m).await.success);

        for _ in 0..20 {
            let delay = sched.jitter_delay();
            assert!(delay >= Duration::from_millis(1));
            assert!(delay <= Duration::from_millis(5));
        }
    }

    #[tokio::test]
    async fn test_run_votes_and_stops_on_cancel() {
        let service = Arc::new(MockVotingService::new());
        service.set_match(Some(open_match("m-1", 1)));
        service.set_balance(1000, 5);

        let cancel = CancellationToken::new();
        let account = Account::new(1, "token-1", SidePreference::Auto);
        let sched = VoteScheduler::new(account, service.clone(), test_config(), cancel.clone()).with_rng_seed(7);

        let handle = tokio::spawn(sched.run());

        // Let it vote and enter cooldown/seek, then cancel.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        cancel.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler should stop promptly")
            .unwrap();

        assert!(matches!(outcome, SchedulerOutcome::Stopped { cycles } if cycles >= 1));
        assert_eq!(service.submitted_votes().len(), 1);
    }

    #[tokio::test]
    async fn test_run_retires_exhausted_account() {
        let service = Arc::new(MockVotingService::new());
        service.set_match(Some(open_match("m-1", 60)));
        service.set_balance(1000, 0);

        let mut config = test_config();
        config.exhausted_cycles = 1;

        let account = Account::new(1, "token-1", SidePreference::Auto);
        let sched = VoteScheduler::new(account, service.clone(), config, CancellationToken::new()).with_rng_seed(7);

        let outcome = tokio::time::timeout(Duration::from_secs(5), sched.run())
            .await
            .expect("scheduler should retire promptly");

        assert!(matches!(outcome, SchedulerOutcome::Exhausted { .. }));
        assert!(service.submitted_votes().is_empty());
    }
}
