//! Orbit CLI - lifecycle management for multi-platform service stacks
//!
//! Operators use it to:
//! - Start, stop and check services across processes, containers and cloud
//! - Publish, update and provision deployments
//! - Back up and restore stateful services
//! - Inspect and clean up recorded resource state

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod error;
mod output;

use commands::{run, services, state, Session};
use config::OrbitConfig;
use orbit_types::{InvocationConfig, DEFAULT_ENVIRONMENT};

/// Orbit CLI application
#[derive(Parser)]
#[command(name = "orbit")]
#[command(about = "Orbit - lifecycle manager for multi-platform service stacks", long_about = None)]
#[command(version)]
struct Cli {
    /// Environment to operate on
    #[arg(short, long, global = true, env = "ORBIT_ENV")]
    env: Option<String>,

    /// Project root
    #[arg(long, global = true, env = "ORBIT_PROJECT_ROOT", default_value = ".")]
    project_root: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ORBIT_CONFIG")]
    config: Option<PathBuf>,

    /// Plan only, change nothing
    #[arg(long, global = true)]
    dry_run: bool,

    /// Keep going after a failed service
    #[arg(long, global = true)]
    continue_on_error: bool,

    /// Output format (table, json, yaml)
    #[arg(short, long, global = true, default_value = "table")]
    output: output::OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Operator recorded in result envelopes
    #[arg(long, hide = true, env = "USER", default_value = "unknown")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Run(run::RunCommands),

    /// Recorded resource state
    State {
        #[command(subcommand)]
        command: state::StateCommands,
    },

    /// List declared services of the environment
    Services,

    /// Show resolved configuration
    Config,
}

fn init_tracing(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so json/yaml output on stdout stays parseable
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let project_root = cli
        .project_root
        .canonicalize()
        .unwrap_or_else(|_| cli.project_root.clone());

    let config = OrbitConfig::load(cli.config.as_deref(), &project_root)
        .context("failed to load configuration")?;

    let environment = cli
        .env
        .clone()
        .or_else(|| config.default_environment.clone())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

    let mut invocation = InvocationConfig::new(&project_root, environment)
        .with_dry_run(cli.dry_run)
        .with_user(cli.user.clone())
        .with_verbosity(cli.verbose);
    if let Some(dir) = &config.state_dir {
        invocation = invocation.with_state_dir(dir);
    }

    let session = Session {
        config,
        invocation,
        format: cli.output,
        continue_on_error: cli.continue_on_error,
    };

    match cli.command {
        Commands::Run(command) => {
            let failed = run::execute(command, &session).await?;
            if failed {
                std::process::exit(1);
            }
        }
        Commands::State { command } => state::execute(command, &session).await?,
        Commands::Services => services::execute(&session)?,
        Commands::Config => {
            println!("Project root: {}", session.invocation.project_root.display());
            println!("Environment: {}", session.environment());
            println!("State dir: {}", session.invocation.state_dir().display());
            output::print_single(&session.config, session.format)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_lifecycle_commands_are_top_level() {
        let cli = Cli::try_parse_from(["orbit", "--env", "staging", "stop", "backend", "--timeout", "5"])
            .unwrap();
        assert_eq!(cli.env.as_deref(), Some("staging"));
        match cli.command {
            Commands::Run(command) => {
                let (kind, selection, options) = command.into_parts();
                assert_eq!(kind, orbit_types::CommandKind::Stop);
                assert_eq!(selection.services, vec!["backend".to_string()]);
                assert_eq!(options.get("timeout_secs"), Some(&serde_json::json!(5)));
            }
            _ => panic!("expected a lifecycle command"),
        }
    }

    #[test]
    fn test_exec_takes_trailing_command() {
        let cli = Cli::try_parse_from(["orbit", "exec", "backend", "--", "ls", "-la"]).unwrap();
        assert!(matches!(cli.command, Commands::Run(run::RunCommands::Exec { .. })));
    }

    #[test]
    fn test_all_conflicts_with_names() {
        assert!(Cli::try_parse_from(["orbit", "start", "backend", "--all"]).is_err());
    }
}
