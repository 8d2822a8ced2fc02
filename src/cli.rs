//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ExecutionMode;

/// Versusbot - vote scheduler for the Wreck League Versus frame
#[derive(Parser)]
#[command(
    name = "versusbot",
    about = "Match-timing-driven vote scheduler for the Wreck League Versus frame",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the continuous voting loop
    Run {
        /// Override the configured execution mode (sequential, concurrent)
        #[arg(short, long)]
        mode: Option<ExecutionMode>,
    },

    /// Vote once for every account, then exit
    Vote,

    /// Show per-account fuel balances
    Fuel {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Claim pending fuel rewards for every account
    Claim,

    /// Show the current match and its voting window
    Timing {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for reporting commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["versusbot"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_run_with_mode() {
        let cli = Cli::parse_from(["versusbot", "run", "--mode", "sequential"]);
        match cli.command {
            Some(Command::Run { mode }) => assert_eq!(mode, Some(ExecutionMode::Sequential)),
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_parse_fuel_json() {
        let cli = Cli::parse_from(["versusbot", "fuel", "--format", "json"]);
        match cli.command {
            Some(Command::Fuel { format }) => assert_eq!(format, OutputFormat::Json),
            _ => panic!("expected fuel command"),
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
