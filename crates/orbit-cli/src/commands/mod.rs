//! CLI command implementations

pub mod run;
pub mod services;
pub mod state;

use orbit_state::FileStateStore;
use orbit_types::InvocationConfig;

use crate::config::OrbitConfig;
use crate::output::OutputFormat;

/// Everything resolved from flags and config for one invocation
#[derive(Debug, Clone)]
pub struct Session {
    pub config: OrbitConfig,
    pub invocation: InvocationConfig,
    pub format: OutputFormat,
    pub continue_on_error: bool,
}

impl Session {
    /// File-backed state store under the invocation's state directory
    pub fn store(&self) -> FileStateStore {
        FileStateStore::new(self.invocation.state_dir())
    }

    pub fn environment(&self) -> &str {
        &self.invocation.environment
    }
}
