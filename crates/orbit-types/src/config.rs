//! Per-invocation configuration
//!
//! Built once at the edge (CLI) and passed by reference through the
//! dispatcher and into every handler. Core crates never read environment
//! variables or process-global state themselves.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ExecutionInfo;

/// Default environment name
pub const DEFAULT_ENVIRONMENT: &str = "local";

/// Default state directory, relative to the project root
pub const DEFAULT_STATE_DIR: &str = "state";

/// Explicit configuration for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationConfig {
    /// Project root; relative paths in service config resolve against it
    pub project_root: PathBuf,

    /// Environment name (e.g. `local`, `staging`, `production`)
    pub environment: String,

    /// Explicit state directory, overriding `<project_root>/state`
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// 0 = normal, 1 = verbose, 2+ = trace
    #[serde(default)]
    pub verbosity: u8,

    /// Plan only, do not touch anything
    #[serde(default)]
    pub dry_run: bool,

    /// Operator identity recorded in result envelopes
    #[serde(default)]
    pub user: String,
}

impl InvocationConfig {
    pub fn new(project_root: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            environment: environment.into(),
            state_dir: None,
            verbosity: 0,
            dry_run: false,
            user: String::new(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Directory holding `<environment>/<service>.json` state files
    pub fn state_dir(&self) -> PathBuf {
        match &self.state_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.project_root.join(dir),
            None => self.project_root.join(DEFAULT_STATE_DIR),
        }
    }

    /// Resolve a possibly relative path against the project root
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Execution context recorded in the result envelope
    pub fn execution_info(&self) -> ExecutionInfo {
        ExecutionInfo {
            user: self.user.clone(),
            working_directory: self.project_root.display().to_string(),
            dry_run: self.dry_run,
        }
    }
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self::new(".", DEFAULT_ENVIRONMENT)
    }
}
