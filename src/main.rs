//! Versusbot - vote scheduler CLI entry point

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use versusbot::cli::{Cli, Command, OutputFormat};
use versusbot::client::{VersusClient, VotingService};
use versusbot::config::{Config, ExecutionMode};
use versusbot::domain::{Account, load_accounts};
use versusbot::orchestrator::Orchestrator;
use versusbot::scheduler::SchedulerConfig;
use versusbot::window::{WindowState, classify, format_duration};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Some(Command::Run { mode }) => cmd_run(&config, mode).await,
        Some(Command::Vote) => cmd_vote(&config).await,
        Some(Command::Fuel { format }) => cmd_fuel(&config, format).await,
        Some(Command::Claim) => cmd_claim(&config).await,
        Some(Command::Timing { format }) => cmd_timing(&config, format).await,
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn build_service(config: &Config) -> Result<Arc<dyn VotingService>> {
    let client = VersusClient::from_config(&config.api).context("Failed to create API client")?;
    Ok(Arc::new(client))
}

fn load_configured_accounts(config: &Config) -> Result<Vec<Account>> {
    let preference = config.voting.side_preference()?;
    load_accounts(&config.accounts.tokens_file, preference)
}

/// Run the continuous voting loop until interrupted.
async fn cmd_run(config: &Config, mode_override: Option<ExecutionMode>) -> Result<()> {
    config.validate()?;

    let mut accounts = load_configured_accounts(config)?;
    let service = build_service(config)?;
    let scheduler_config = SchedulerConfig::from_config(config)?;
    let mode = mode_override.unwrap_or(config.voting.execution_mode);

    println!("Starting voting loop");
    println!("  Accounts: {}", accounts.len());
    println!("  Mode: {}", mode);
    println!("  Strategy: {}", scheduler_config.strategy);
    println!();

    // Scan accounts up front so misconfigured credentials surface before
    // scheduling starts.
    for account in &mut accounts {
        match service.resolve_identity(&account.credential).await {
            Ok(identity) => {
                let fuel = service
                    .fuel_balance(&account.credential, identity.fid)
                    .await
                    .unwrap_or(0);
                account.fuel_balance = fuel;
                println!("  account {:>2} | fid {} | fuel {}", account.index, identity.fid, fuel);
                account.fid = Some(identity.fid);
                account.username = identity.username;
            }
            Err(e) => {
                warn!(account = account.index, error = %e, "identity resolution failed, will retry lazily");
                println!("  account {:>2} | identity unresolved", account.index);
            }
        }
    }
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone())?;

    let orchestrator = Orchestrator::new(
        service,
        scheduler_config,
        cancel,
        Duration::from_secs(config.retry.shutdown_grace_secs),
    );

    orchestrator.run(accounts, mode).await
}

/// One vote pass over all accounts.
async fn cmd_vote(config: &Config) -> Result<()> {
    config.validate()?;

    let accounts = load_configured_accounts(config)?;
    let service = build_service(config)?;
    let scheduler_config = SchedulerConfig::from_config(config)?;

    let orchestrator = Orchestrator::new(
        service,
        scheduler_config,
        CancellationToken::new(),
        Duration::from_secs(config.retry.shutdown_grace_secs),
    );

    let summary = orchestrator.vote_once(accounts).await?;
    println!("{}", summary.render());

    Ok(())
}

/// Show per-account fuel balances.
async fn cmd_fuel(config: &Config, format: OutputFormat) -> Result<()> {
    let accounts = load_configured_accounts(config)?;
    let service = build_service(config)?;

    let mut entries = Vec::new();
    for account in &accounts {
        match service.resolve_identity(&account.credential).await {
            Ok(identity) => {
                let fuel = service
                    .fuel_balance(&account.credential, identity.fid)
                    .await
                    .unwrap_or(0);
                entries.push((account.index, Some(identity), fuel));
            }
            Err(e) => {
                warn!(account = account.index, error = %e, "identity resolution failed");
                entries.push((account.index, None, 0));
            }
        }
    }

    match format {
        OutputFormat::Json => {
            let json: Vec<_> = entries
                .iter()
                .map(|(index, identity, fuel)| {
                    serde_json::json!({
                        "account": index,
                        "fid": identity.as_ref().map(|i| i.fid),
                        "username": identity.as_ref().and_then(|i| i.username.clone()),
                        "fuel": fuel,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            let total: u64 = entries.iter().map(|(_, _, fuel)| u64::from(*fuel)).sum();
            for (index, identity, fuel) in &entries {
                let who = match identity {
                    Some(identity) => format!(
                        "fid {}{}",
                        identity.fid,
                        identity
                            .username
                            .as_deref()
                            .map(|u| format!(" (@{})", u))
                            .unwrap_or_default()
                    ),
                    None => "unresolved".to_string(),
                };
                let fuel_text = fuel.to_string();
                let fuel_str = if *fuel > 0 {
                    fuel_text.as_str().green()
                } else {
                    fuel_text.as_str().red()
                };
                println!("account {:>2} | {} | fuel: {}", index, who, fuel_str);
            }
            println!("total fuel: {}", total);
        }
    }

    Ok(())
}

/// Claim pending fuel rewards for every account.
async fn cmd_claim(config: &Config) -> Result<()> {
    let accounts = load_configured_accounts(config)?;
    let service = build_service(config)?;

    for account in &accounts {
        let identity = match service.resolve_identity(&account.credential).await {
            Ok(identity) => identity,
            Err(e) => {
                let message = format!("identity error: {}", e);
                println!("account {:>2} | {}", account.index, message.as_str().red());
                continue;
            }
        };

        match service.claim_fuel_reward(&account.credential, identity.fid).await {
            Ok(granted) if granted > 0 => {
                let message = format!("claimed {} fuel", granted);
                println!("account {:>2} | {}", account.index, message.as_str().green());
            }
            Ok(_) => println!("account {:>2} | nothing to claim", account.index),
            Err(e) => {
                let message = format!("claim failed: {}", e);
                println!("account {:>2} | {}", account.index, message.as_str().red());
            }
        }
    }

    Ok(())
}

/// Show the current match and its voting window.
async fn cmd_timing(config: &Config, format: OutputFormat) -> Result<()> {
    let accounts = load_configured_accounts(config)?;
    let service = build_service(config)?;

    let identity = service.resolve_identity(&accounts[0].credential).await?;
    let Some(m) = service.current_match(identity.fid).await? else {
        println!("No active match");
        return Ok(());
    };

    let state = classify(&m, Utc::now());

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "match": m,
                "window": state.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Match {}", m.id);
            if let Some(status) = &m.status {
                println!("  Status: {}", status);
            }
            println!("  Total votes: {}", m.total_votes);
            if let Some(start) = m.voting_start {
                println!("  Voting start: {}", start.to_rfc3339());
            }
            if let Some(end) = m.voting_end {
                println!("  Voting end: {}", end.to_rfc3339());
            }
            println!("  Window: {}", state);
            for side in &m.sides {
                println!(
                    "  Side {} | win {}% | {} votes | {} fuel{}",
                    side.id,
                    side.win_probability,
                    side.vote_count,
                    side.fuel_points,
                    side.owner.as_deref().map(|o| format!(" | {}", o)).unwrap_or_default()
                );
            }
            if let WindowState::Open(remaining) = state {
                let message = format!("Voting is OPEN ({} left)", format_duration(remaining));
                println!("  {}", message.as_str().green());
            }
        }
    }

    Ok(())
}

/// Cancel the shared token on SIGINT/SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => warn!("SIGINT received"),
                _ = sigterm.recv() => warn!("SIGTERM received"),
            }
            cancel.cancel();
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received");
            }
            cancel.cancel();
        });
    }

    Ok(())
}
