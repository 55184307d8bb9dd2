//! `sosctl` - CLI for sosguard
//!
//! Runs SOS drills against the escalation controller and inspects the
//! configured contacts.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use sosguard::cli::{Cli, Command, ConfigCommand, ContactsCommand, DrillAction, DrillCommand};
use sosguard::session::SessionSnapshot;
use sosguard::{
    init_logging, Config, Location, LocationProvider, LogDispatcher, Notice, Notifier, PhaseKind,
    Result, SosController, StaticLocation,
};

/// Prints notices to stdout, the console stand-in for toasts.
#[derive(Debug, Clone, Copy)]
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        println!("[{}] {}", notice.level, notice.message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Drill(drill_cmd) => handle_drill(config, drill_cmd).await,
        Command::Contacts(contacts_cmd) => handle_contacts(&config, &contacts_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_drill(mut config: Config, cmd: DrillCommand) -> Result<()> {
    if let Some(tick_ms) = cmd.tick_ms {
        config.escalation.tick_interval_ms = tick_ms;
        config.validate()?;
    }

    let location = match (cmd.lat, cmd.lon) {
        (Some(lat), Some(lon)) => Some(Location::new(lat, lon, cmd.label)?),
        _ => config.fixed_location()?,
    };
    let provider = StaticLocation::new(location);

    let directory = config.contact_directory();
    let controller = SosController::new(&config, Arc::new(LogDispatcher), Arc::new(ConsoleNotifier));

    let mut updates = controller.subscribe();
    let watcher = tokio::spawn(async move {
        let mut last_phase = PhaseKind::Idle;
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            if snapshot.phase != last_phase
                || snapshot.arming_seconds_remaining.is_some()
                || snapshot.retry_seconds_remaining.is_some()
            {
                println!("  {}", describe(&snapshot));
            }
            last_phase = snapshot.phase;
        }
    });

    println!("SOS drill. {}", DrillAction::USAGE);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let action = match line.parse::<DrillAction>() {
            Ok(action) => action,
            Err(e) => {
                println!("{e}. {}", DrillAction::USAGE);
                continue;
            }
        };
        let applied = match action {
            DrillAction::Arm => controller.begin_arming_from(&provider).await,
            DrillAction::Confirm => controller.confirm_and_dispatch().await,
            DrillAction::Cancel => controller.cancel_arming().await,
            DrillAction::Acknowledge => controller.acknowledge_help_arrived().await,
            DrillAction::Retry => controller.retry_now().await,
            DrillAction::Stop => controller.stop_session().await,
            DrillAction::Call(n) => match directory.contacts().get(n - 1) {
                Some(contact) => {
                    controller.record_call(contact).await;
                    println!("  tel:{}", contact.number);
                    true
                }
                None => {
                    println!("  no contact #{n}; see `sosctl contacts`");
                    true
                }
            },
            DrillAction::Share => {
                match provider.current_location().await? {
                    Some(location) => println!("  {}", location.share_text()),
                    None => println!("  location unknown"),
                }
                true
            }
            DrillAction::Status => {
                println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
                true
            }
            DrillAction::Log => {
                for entry in controller.recent_log(20).await {
                    println!(
                        "  {} session {}: {}",
                        entry.timestamp.format("%H:%M:%S"),
                        entry.session_id,
                        entry.event
                    );
                }
                true
            }
            DrillAction::Help => {
                println!("{}", DrillAction::USAGE);
                true
            }
            DrillAction::Quit => break,
        };
        if !applied {
            println!("  (ignored while {})", controller.snapshot().phase);
        }
    }

    controller.shutdown().await;
    watcher.abort();
    Ok(())
}

fn describe(snapshot: &SessionSnapshot) -> String {
    match (
        snapshot.arming_seconds_remaining,
        snapshot.retry_seconds_remaining,
    ) {
        (Some(n), _) => format!("arming: {n} left"),
        (_, Some(n)) => format!(
            "no response to attempt {}: retry in {n}",
            snapshot.attempt_count
        ),
        _ if snapshot.attempt_count > 0 => {
            format!("{} (attempt {})", snapshot.phase, snapshot.attempt_count)
        }
        _ => snapshot.phase.to_string(),
    }
}

fn handle_contacts(config: &Config, cmd: &ContactsCommand) -> Result<()> {
    let directory = config.contact_directory();
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&directory)?);
        return Ok(());
    }

    println!("{:<3} {:<24} {:<18} {:<10} Tier", "#", "Name", "Number", "Kind");
    for (i, contact) in directory.contacts().iter().enumerate() {
        println!(
            "{:<3} {:<24} {:<18} {:<10} {}",
            i + 1,
            contact.name,
            contact.number,
            contact.kind,
            if contact.primary { "first alert" } else { "escalation" }
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Escalation]");
                println!(
                    "  Tick interval (ms):    {}",
                    config.escalation.tick_interval_ms
                );
                println!("  Arming ticks:          {}", config.escalation.arming_ticks);
                println!(
                    "  Acknowledgement ticks: {}",
                    config.escalation.acknowledgement_ticks
                );
                println!("  Retry ticks:           {}", config.escalation.retry_ticks);
                println!();
                println!("[Contacts]");
                println!(
                    "  Authorities:           {}",
                    config.contacts.authorities.len()
                );
                println!("  Personal:              {}", config.contacts.personal.len());
                println!();
                println!("[Location]");
                match config.fixed_location()? {
                    Some(location) => println!("  Fixed:                 {location}"),
                    None => println!("  Fixed:                 none"),
                }
                println!();
                println!("[History]");
                println!("  Limit:                 {}", config.history.limit);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
