//! Output formatting utilities

use colored::*;
use orbit_types::{CommandPayload, CommandResult, CommandResults, ResourceState};
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::error::CliResult;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Table row for one command result
#[derive(Debug, Serialize, Tabled)]
pub struct ResultRow {
    service: String,
    platform: String,
    status: String,
    detail: String,
    #[tabled(rename = "ms")]
    duration: u64,
}

impl From<&CommandResult> for ResultRow {
    fn from(result: &CommandResult) -> Self {
        let status = if result.success {
            "ok".green().to_string()
        } else {
            "failed".red().to_string()
        };
        let detail = match &result.error {
            Some(error) => error.clone(),
            None => payload_detail(&result.payload),
        };
        Self {
            service: result.entity.clone(),
            platform: result.platform.to_string(),
            status,
            detail,
            duration: result.duration_ms,
        }
    }
}

/// One-line summary of a successful payload
fn payload_detail(payload: &CommandPayload) -> String {
    match payload {
        CommandPayload::Start(start) => match (&start.endpoint, &start.resources) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Some(resources)) => resources.display_id(),
            (None, None) => String::new(),
        },
        CommandPayload::Stop(stop) if !stop.was_running => "was not running".into(),
        CommandPayload::Stop(_) => "stopped".into(),
        CommandPayload::Check(check) => check
            .status
            .clone()
            .unwrap_or_else(|| if check.running { "running" } else { "stopped" }.into()),
        CommandPayload::Backup(backup) => backup.backup_id.clone(),
        CommandPayload::Restore(restore) => format!("restored {}", restore.backup_id),
        CommandPayload::Exec(exec) => exec
            .exit_code
            .map(|code| format!("exit {}", code))
            .unwrap_or_default(),
        CommandPayload::Test(test) => match (test.passed, test.failed) {
            (Some(passed), Some(failed)) => format!("{} passed, {} failed", passed, failed),
            _ => test.exit_code.map(|c| format!("exit {}", c)).unwrap_or_default(),
        },
        CommandPayload::Logs(logs) => format!("{} lines", logs.lines.len()),
        CommandPayload::Generic(map) => match map.get("planned").and_then(|v| v.as_str()) {
            Some(planned) => format!("would {}", planned),
            None => String::new(),
        },
        CommandPayload::None => String::new(),
    }
}

/// Table row for stored resource state
#[derive(Debug, Serialize, Tabled)]
pub struct StateRow {
    service: String,
    platform: String,
    resource: String,
    endpoint: String,
    started: String,
}

impl From<&ResourceState> for StateRow {
    fn from(state: &ResourceState) -> Self {
        Self {
            service: state.entity.clone(),
            platform: state.platform.to_string(),
            resource: state
                .resources
                .as_ref()
                .map(|r| r.display_id())
                .unwrap_or_else(|| "-".into()),
            endpoint: state.endpoint.clone().unwrap_or_else(|| "-".into()),
            started: state.start_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Print a command envelope in the specified format
pub fn print_results(results: &CommandResults, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<ResultRow> = results.results.iter().map(ResultRow::from).collect();
            if rows.is_empty() {
                println!("{}", "No services".dimmed());
            } else {
                println!("{}", Table::new(rows));
            }
            for result in &results.results {
                for warning in &result.warnings {
                    print_warning(&format!("{}: {}", result.entity, warning));
                }
            }
            if results.execution_context.dry_run {
                print_info("dry run: nothing was changed");
            }

            let summary = results.summary;
            let line = format!(
                "{} {}: {} succeeded, {} failed ({} ms)",
                results.command, results.environment, summary.succeeded, summary.failed,
                results.duration_ms
            );
            if summary.failed > 0 {
                print_error(&line);
            } else {
                print_success(&line);
            }
            Ok(())
        }
        OutputFormat::Json | OutputFormat::Yaml => print_single(results, format),
    }
}

/// Print a vector of items in the specified format
pub fn print_output<T: Serialize + Tabled>(data: Vec<T>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No results".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&data)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&data)?),
    }
    Ok(())
}

/// Print a single item in the specified format
pub fn print_single<T: Serialize>(data: &T, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table | OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?)
        }
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(data)?),
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}
