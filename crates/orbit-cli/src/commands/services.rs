//! Declared services of the environment

use orbit_types::ServiceTarget;
use serde::Serialize;
use tabled::Tabled;

use super::Session;
use crate::error::CliResult;
use crate::output;

/// Table row for a declared service
#[derive(Debug, Serialize, Tabled)]
struct ServiceRow {
    service: String,
    platform: String,
    config: String,
}

impl From<&ServiceTarget> for ServiceRow {
    fn from(target: &ServiceTarget) -> Self {
        let config = if target.is_virtual() {
            let members = target
                .config
                .get("members")
                .and_then(|m| m.as_array())
                .map(|m| m.len())
                .unwrap_or_default();
            format!("virtual ({} members)", members)
        } else {
            target.config.keys().cloned().collect::<Vec<_>>().join(", ")
        };
        Self {
            service: target.name.clone(),
            platform: target.platform.to_string(),
            config,
        }
    }
}

/// Print the services declared for the environment
pub fn execute(session: &Session) -> CliResult<()> {
    let targets = session.config.targets(session.environment());
    match session.format {
        output::OutputFormat::Table => {
            output::print_output(targets.iter().map(ServiceRow::from).collect(), session.format)
        }
        _ => output::print_single(&targets, session.format),
    }
}
