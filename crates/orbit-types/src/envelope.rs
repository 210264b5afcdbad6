//! The aggregate envelope returned by every command invocation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CommandKind, CommandResult};

/// Counts derived from a result list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Total warnings across all results
    pub warnings: usize,
}

impl ResultSummary {
    /// Pure function of the result list
    pub fn from_results(results: &[CommandResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            warnings: results.iter().map(|r| r.warnings.len()).sum(),
        }
    }
}

/// Who ran the command, from where, and whether it was a dry run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInfo {
    pub user: String,
    pub working_directory: String,
    pub dry_run: bool,
}

/// Result envelope for one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResults {
    pub command: CommandKind,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: Vec<CommandResult>,
    pub summary: ResultSummary,
    #[serde(rename = "executionContext")]
    pub execution_context: ExecutionInfo,

    /// Command-level aggregate produced by the post-execution hook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Value>,
}

impl CommandResults {
    /// Build an envelope; the summary is always recomputed from `results`
    pub fn new(
        command: CommandKind,
        environment: impl Into<String>,
        timestamp: DateTime<Utc>,
        duration_ms: u64,
        results: Vec<CommandResult>,
        execution_context: ExecutionInfo,
    ) -> Self {
        let summary = ResultSummary::from_results(&results);
        Self {
            command,
            environment: environment.into(),
            timestamp,
            duration_ms,
            results,
            summary,
            execution_context,
            aggregate: None,
        }
    }

    pub fn with_aggregate(mut self, aggregate: Option<Value>) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Whether any service failed
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Look up the result for a service
    pub fn result_for(&self, entity: &str) -> Option<&CommandResult> {
        self.results.iter().find(|r| r.entity == entity)
    }
}
