//! Resource state inspection and cleanup

use clap::Subcommand;
use orbit_state::{PidLivenessProbe, ResourceStateStore};

use super::Session;
use crate::error::{CliError, CliResult};
use crate::output::{self, print_error, print_info, print_success, StateRow};

/// State subcommands
#[derive(Debug, Subcommand)]
pub enum StateCommands {
    /// List recorded state for the environment
    List,

    /// Show the recorded state of one service
    Show {
        /// Service name
        service: String,
    },

    /// Forget the recorded state of one service
    Clear {
        /// Service name
        service: String,
    },

    /// Forget all recorded state of the environment
    ClearEnv {
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Remove state whose process no longer exists
    Cleanup,

    /// List environments holding state
    Envs,
}

/// Execute a state command
pub async fn execute(command: StateCommands, session: &Session) -> CliResult<()> {
    let store = session.store();
    let environment = session.environment();

    match command {
        StateCommands::List => {
            let states = store.list(environment).await?;
            let rows: Vec<StateRow> = states.iter().map(StateRow::from).collect();
            output::print_output(rows, session.format)
        }

        StateCommands::Show { service } => match store.load(environment, &service).await {
            Some(state) => output::print_single(&state, session.format),
            None => Err(CliError::InvalidInput(format!(
                "no state recorded for {} in {}",
                service, environment
            ))),
        },

        StateCommands::Clear { service } => {
            store.clear(environment, &service).await?;
            print_success(&format!("Cleared state of {} in {}", service, environment));
            Ok(())
        }

        StateCommands::ClearEnv { yes } => {
            if !yes {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!("Forget all state of environment {}?", environment))
                    .default(false)
                    .interact()
                    .unwrap_or(false);

                if !confirm {
                    print_error("Aborted");
                    return Ok(());
                }
            }

            store.clear_environment(environment).await?;
            print_success(&format!("Cleared environment {}", environment));
            Ok(())
        }

        StateCommands::Cleanup => {
            let removed = store.cleanup(environment, &PidLivenessProbe::new()).await?;
            if removed.is_empty() {
                print_info("No stale state");
            } else {
                for service in &removed {
                    print_success(&format!("Removed stale state of {}", service));
                }
            }
            Ok(())
        }

        StateCommands::Envs => {
            for env in store.list_environments().await? {
                println!("{}", env);
            }
            Ok(())
        }
    }
}
