mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use enqconf::{ConfigSources, EnqConfig};
use enqueueing::{OrderingKind, SessionManager};
use serde::Serialize;
use session_store::Session;

/// Exit code for a well-formed request that did not take effect (lock busy,
/// session absent, transition rejected). Callers retry later.
const EXIT_NOT_APPLIED: u8 = 2;

/// Inspect and drive enqueueing sessions
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file, replacing ./enqueuer.toml in the search order
    #[arg(long, global = true, env = "ENQUEUER_CONFIG")]
    config: Option<PathBuf>,

    /// State directory holding the session store and lock files
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// How long a mutation waits for the entity lock
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    lock_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Session(SessionCommand),
    /// Print the effective configuration
    Config,
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// Open a session, or reset a stopped one
    Init {
        entity: String,
        /// Also reset a live session and clear its cursor
        #[arg(long)]
        restart: bool,
    },
    /// EXECUTE -> SKIP
    Suspend { entity: String },
    /// SKIP -> EXECUTE
    Resume { entity: String },
    /// EXECUTE|SKIP -> STOP
    Stop { entity: String },
    /// Delete the session record
    Remove { entity: String },
    /// Print one session
    Show { entity: String },
    /// Print the session the drainer would pick next
    Next,
    /// Record the last drained cursor value
    Advance {
        entity: String,
        value: String,
        #[arg(long, default_value = "text")]
        kind: OrderingKind,
    },
    /// Clear the cursor so draining starts from the beginning
    ClearCursor { entity: String },
    /// Print all sessions, oldest first
    List,
}

enum Outcome {
    Applied,
    NotApplied(String),
}

#[derive(Serialize)]
struct Removal<'a> {
    entity: &'a str,
    removed: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let (config, sources) = load_config(&cli)?;

    let _telemetry = telemetry::init(&config.telemetry).context("Failed to initialize telemetry")?;

    let command = cli.command;
    // Lock waits block the thread.
    let outcome = tokio::task::spawn_blocking(move || run(command, &config, &sources))
        .await
        .context("command task failed")??;

    Ok(match outcome {
        Outcome::Applied => ExitCode::SUCCESS,
        Outcome::NotApplied(reason) => {
            eprintln!("{reason}");
            ExitCode::from(EXIT_NOT_APPLIED)
        }
    })
}

fn load_config(cli: &Cli) -> Result<(EnqConfig, ConfigSources)> {
    let (mut config, sources) = EnqConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load config")?;
    if let Some(state_dir) = &cli.state_dir {
        config.paths.state_dir = state_dir.clone();
    }
    if let Some(timeout_ms) = cli.lock_timeout_ms {
        config.lock.timeout_ms = timeout_ms;
    }
    Ok((config, sources))
}

fn run(command: Commands, config: &EnqConfig, sources: &ConfigSources) -> Result<Outcome> {
    let command = match command {
        Commands::Config => {
            print!("{}", config.to_toml_with_sources(sources)?);
            return Ok(Outcome::Applied);
        }
        Commands::Session(command) => command,
    };

    let manager = SessionManager::from_config(config).context("Failed to open session store")?;
    tracing::debug!(state_dir = %config.paths.state_dir.display(), ?command, "running command");

    match command {
        SessionCommand::Init { entity, restart } => {
            let applied = manager.initialize(&entity, restart)?;
            finish(&manager, &entity, applied, "init")
        }
        SessionCommand::Suspend { entity } => {
            let applied = manager.suspend(&entity)?;
            finish(&manager, &entity, applied, "suspend")
        }
        SessionCommand::Resume { entity } => {
            let applied = manager.resume(&entity)?;
            finish(&manager, &entity, applied, "resume")
        }
        SessionCommand::Stop { entity } => {
            let applied = manager.stop(&entity)?;
            finish(&manager, &entity, applied, "stop")
        }
        SessionCommand::Remove { entity } => {
            let Some(session) = manager.get_session(&entity)? else {
                print_json(&Removal { entity: &entity, removed: false })?;
                return Ok(Outcome::Applied);
            };
            if !manager.remove(&session)? {
                return Ok(not_applied("remove", &entity));
            }
            print_json(&Removal { entity: &entity, removed: true })?;
            Ok(Outcome::Applied)
        }
        SessionCommand::Show { entity } => {
            print_json(&manager.get_session(&entity)?)?;
            Ok(Outcome::Applied)
        }
        SessionCommand::Next => {
            print_json(&manager.get_next_session()?)?;
            Ok(Outcome::Applied)
        }
        SessionCommand::Advance { entity, value, kind } => {
            let value = kind
                .parse(&value)
                .with_context(|| format!("invalid cursor value for '{entity}'"))?;
            let Some(session) = manager.get_session(&entity)? else {
                return Ok(Outcome::NotApplied(format!("no session for '{entity}'")));
            };
            let applied = manager.update_ordering_value(&session, Some(&value))?;
            finish(&manager, &entity, applied, "advance")
        }
        SessionCommand::ClearCursor { entity } => {
            let Some(session) = manager.get_session(&entity)? else {
                return Ok(Outcome::NotApplied(format!("no session for '{entity}'")));
            };
            let applied = manager.update_ordering_value(&session, None)?;
            finish(&manager, &entity, applied, "clear-cursor")
        }
        SessionCommand::List => {
            print_json(&manager.list_sessions()?)?;
            Ok(Outcome::Applied)
        }
    }
}

/// Print the session after a successful mutation.
fn finish(manager: &SessionManager, entity: &str, applied: bool, op: &str) -> Result<Outcome> {
    if !applied {
        return Ok(not_applied(op, entity));
    }
    let session: Option<Session> = manager.get_session(entity)?;
    print_json(&session)?;
    Ok(Outcome::Applied)
}

fn not_applied(op: &str, entity: &str) -> Outcome {
    Outcome::NotApplied(format!("{op} was not applied to '{entity}'; retry later"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
