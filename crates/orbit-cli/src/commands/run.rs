//! Lifecycle commands: everything that goes through the dispatcher

use clap::{Args, Subcommand};
use orbit_control::{CommandDispatcher, CommandOptions};
use orbit_platform::PlatformRegistry;
use orbit_types::CommandKind;
use std::sync::Arc;

use super::Session;
use crate::error::CliResult;
use crate::output;

/// Which services a command applies to
#[derive(Debug, Clone, Args)]
pub struct Selection {
    /// Services to act on, in order
    pub services: Vec<String>,

    /// Act on every service of the environment
    #[arg(long, conflicts_with = "services")]
    pub all: bool,
}

/// Lifecycle subcommands
#[derive(Debug, Subcommand)]
pub enum RunCommands {
    /// Start services
    Start(Selection),

    /// Stop services
    Stop {
        #[command(flatten)]
        selection: Selection,

        /// Seconds to wait before force-killing
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Check health and liveness
    Check(Selection),

    /// Roll out a new version
    Update {
        #[command(flatten)]
        selection: Selection,

        /// Image to deploy
        #[arg(long)]
        image: Option<String>,
    },

    /// Create infrastructure
    Provision(Selection),

    /// Publish build artifacts
    Publish(Selection),

    /// Back up service data
    Backup(Selection),

    /// Restore service data
    Restore {
        #[command(flatten)]
        selection: Selection,

        /// Backup id, or "latest"
        #[arg(long)]
        backup: String,
    },

    /// Run a command inside services
    Exec {
        #[command(flatten)]
        selection: Selection,

        /// Command and arguments, after `--`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Run test suites
    Test(Selection),

    /// Show recent log lines
    Logs {
        #[command(flatten)]
        selection: Selection,

        /// Number of lines
        #[arg(long)]
        tail: Option<u64>,
    },
}

impl RunCommands {
    /// Command kind, selection and caller options
    pub fn into_parts(self) -> (CommandKind, Selection, CommandOptions) {
        let options = CommandOptions::new();
        match self {
            RunCommands::Start(selection) => (CommandKind::Start, selection, options),
            RunCommands::Stop { selection, timeout } => {
                let options = match timeout {
                    Some(secs) => options.with("timeout_secs", secs),
                    None => options,
                };
                (CommandKind::Stop, selection, options)
            }
            RunCommands::Check(selection) => (CommandKind::Check, selection, options),
            RunCommands::Update { selection, image } => {
                let options = match image {
                    Some(image) => options.with("image", image),
                    None => options,
                };
                (CommandKind::Update, selection, options)
            }
            RunCommands::Provision(selection) => (CommandKind::Provision, selection, options),
            RunCommands::Publish(selection) => (CommandKind::Publish, selection, options),
            RunCommands::Backup(selection) => (CommandKind::Backup, selection, options),
            RunCommands::Restore { selection, backup } => {
                (CommandKind::Restore, selection, options.with("backup", backup))
            }
            RunCommands::Exec { selection, command } => {
                (CommandKind::Exec, selection, options.with("command", command))
            }
            RunCommands::Test(selection) => (CommandKind::Test, selection, options),
            RunCommands::Logs { selection, tail } => {
                let options = match tail {
                    Some(tail) => options.with("tail", tail),
                    None => options,
                };
                (CommandKind::Logs, selection, options)
            }
        }
    }
}

/// Execute a lifecycle command. Returns whether any service failed.
pub async fn execute(command: RunCommands, session: &Session) -> CliResult<bool> {
    let (kind, selection, mut options) = command.into_parts();
    if session.continue_on_error {
        options.set("continue_on_error", true);
    }

    let targets = session.config.resolve_targets(
        session.environment(),
        &selection.services,
        selection.all,
    )?;

    let dispatcher = CommandDispatcher::builder()
        .with_platforms(PlatformRegistry::with_defaults())
        .with_store(Arc::new(session.store()))
        .build()?;

    let results = dispatcher
        .run(kind, targets, &options, &session.invocation)
        .await?;
    output::print_results(&results, session.format)?;
    Ok(results.has_failures())
}
