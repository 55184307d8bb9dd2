//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands, plus the line
//! commands understood by `sosctl drill`.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Subcommand};

/// Drill command arguments.
#[derive(Debug, Args)]
pub struct DrillCommand {
    /// Override the countdown tick length in milliseconds
    #[arg(long, value_name = "MS")]
    pub tick_ms: Option<u64>,

    /// Latitude to attach to alerts (overrides the configured location)
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude to attach to alerts
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Place name for the location
    #[arg(long, requires = "lat")]
    pub label: Option<String>,
}

/// Contacts command arguments.
#[derive(Debug, Args)]
pub struct ContactsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// One line of input during a drill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrillAction {
    /// Place a direct call to the Nth listed contact (1-based).
    Call(usize),
    /// Print the shareable location text.
    Share,
    /// Start the arming countdown.
    Arm,
    /// Send the first alert without waiting for the countdown.
    Confirm,
    /// Cancel during the arming countdown.
    Cancel,
    /// Help arrived.
    Acknowledge,
    /// Re-send now during the retry countdown.
    Retry,
    /// Abort the session.
    Stop,
    /// Print the current snapshot.
    Status,
    /// Print the emergency log.
    Log,
    /// List the commands.
    Help,
    /// Leave the drill.
    Quit,
}

impl DrillAction {
    /// Usage text for the drill prompt.
    pub const USAGE: &'static str =
        "commands: arm, confirm, cancel, ack, retry, stop, call <n>, share, status, log, help, quit";
}

impl FromStr for DrillAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim().to_ascii_lowercase();
        if let Some(rest) = line.strip_prefix("call") {
            return match rest.trim().parse::<usize>() {
                Ok(n) if n > 0 => Ok(Self::Call(n)),
                _ => Err(format!("expected 'call <n>' with n from 1, got '{line}'")),
            };
        }
        match line.as_str() {
            "arm" | "sos" => Ok(Self::Arm),
            "confirm" | "activate" => Ok(Self::Confirm),
            "cancel" => Ok(Self::Cancel),
            "ack" | "arrived" => Ok(Self::Acknowledge),
            "retry" => Ok(Self::Retry),
            "stop" => Ok(Self::Stop),
            "status" | "s" => Ok(Self::Status),
            "log" => Ok(Self::Log),
            "share" => Ok(Self::Share),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drill_action_parse() {
        assert_eq!("arm".parse::<DrillAction>(), Ok(DrillAction::Arm));
        assert_eq!(" ACK ".parse::<DrillAction>(), Ok(DrillAction::Acknowledge));
        assert_eq!("q".parse::<DrillAction>(), Ok(DrillAction::Quit));
        assert_eq!("retry".parse::<DrillAction>(), Ok(DrillAction::Retry));
    }

    #[test]
    fn test_drill_action_parse_call() {
        assert_eq!("call 2".parse::<DrillAction>(), Ok(DrillAction::Call(2)));
        assert_eq!("CALL  1 ".parse::<DrillAction>(), Ok(DrillAction::Call(1)));
        assert!("call".parse::<DrillAction>().is_err());
        assert!("call 0".parse::<DrillAction>().is_err());
        assert!("call x".parse::<DrillAction>().is_err());
        assert_eq!("share".parse::<DrillAction>(), Ok(DrillAction::Share));
    }

    #[test]
    fn test_drill_action_parse_unknown() {
        let err = "launch".parse::<DrillAction>().unwrap_err();
        assert!(err.contains("launch"));
    }

    #[test]
    fn test_usage_lists_every_command() {
        for word in [
            "arm", "confirm", "cancel", "ack", "retry", "stop", "share", "status", "log", "quit",
        ] {
            assert!(DrillAction::USAGE.contains(word), "{word} missing");
            assert!(word.parse::<DrillAction>().is_ok());
        }
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
