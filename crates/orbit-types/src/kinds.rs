//! Closed sets of commands, platforms and service kinds
//!
//! Dispatch is keyed on these enums rather than on free-form strings, so a
//! new variant forces every exhaustive match (names, catalogs, coverage
//! checks) to be revisited.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseKindError;

/// A lifecycle command that can be applied to a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    /// Start the service
    Start,
    /// Stop the service
    Stop,
    /// Check health / liveness
    Check,
    /// Roll out a new version
    Update,
    /// Create infrastructure for the service
    Provision,
    /// Publish build artifacts
    Publish,
    /// Take a backup of service data
    Backup,
    /// Restore service data from a backup
    Restore,
    /// Run an arbitrary command inside the service
    Exec,
    /// Run the service's test suite
    Test,
    /// Collect recent log output
    Logs,
}

impl CommandKind {
    /// Every command, in display order
    pub const ALL: [CommandKind; 11] = [
        CommandKind::Start,
        CommandKind::Stop,
        CommandKind::Check,
        CommandKind::Update,
        CommandKind::Provision,
        CommandKind::Publish,
        CommandKind::Backup,
        CommandKind::Restore,
        CommandKind::Exec,
        CommandKind::Test,
        CommandKind::Logs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Start => "start",
            CommandKind::Stop => "stop",
            CommandKind::Check => "check",
            CommandKind::Update => "update",
            CommandKind::Provision => "provision",
            CommandKind::Publish => "publish",
            CommandKind::Backup => "backup",
            CommandKind::Restore => "restore",
            CommandKind::Exec => "exec",
            CommandKind::Test => "test",
            CommandKind::Logs => "logs",
        }
    }

    /// Whether the command changes anything outside the orchestrator
    pub fn is_mutating(&self) -> bool {
        !matches!(self, CommandKind::Check | CommandKind::Logs)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseKindError::new("command", s))
    }
}

/// The execution substrate a service runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformKind {
    /// Bare OS process on the local machine
    Process,
    /// Container runtime (docker)
    Container,
    /// Managed cloud infrastructure (AWS)
    Cloud,
    /// Third-party service managed elsewhere
    External,
    /// In-memory test double
    Mock,
}

impl PlatformKind {
    pub const ALL: [PlatformKind; 5] = [
        PlatformKind::Process,
        PlatformKind::Container,
        PlatformKind::Cloud,
        PlatformKind::External,
        PlatformKind::Mock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Process => "process",
            PlatformKind::Container => "container",
            PlatformKind::Cloud => "cloud",
            PlatformKind::External => "external",
            PlatformKind::Mock => "mock",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // Accepted aliases used in older stack files
            "posix" | "local" => Ok(PlatformKind::Process),
            "docker" => Ok(PlatformKind::Container),
            "aws" => Ok(PlatformKind::Cloud),
            _ => PlatformKind::ALL
                .into_iter()
                .find(|p| p.as_str() == s)
                .ok_or_else(|| ParseKindError::new("platform", s)),
        }
    }
}

/// Platform-specific classification of a logical service
///
/// The same logical name can map to different kinds depending on where it
/// runs, e.g. `backend` is an ECS service or a Lambda function on the cloud
/// platform but a plain generic process locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    Generic,
    Database,
    GraphDatabase,
    WebApp,
    EcsService,
    Lambda,
    StaticSite,
    FileSystem,
    ExternalApi,
    Mock,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 10] = [
        ServiceKind::Generic,
        ServiceKind::Database,
        ServiceKind::GraphDatabase,
        ServiceKind::WebApp,
        ServiceKind::EcsService,
        ServiceKind::Lambda,
        ServiceKind::StaticSite,
        ServiceKind::FileSystem,
        ServiceKind::ExternalApi,
        ServiceKind::Mock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Generic => "generic",
            ServiceKind::Database => "database",
            ServiceKind::GraphDatabase => "graph-database",
            ServiceKind::WebApp => "web-app",
            ServiceKind::EcsService => "ecs-service",
            ServiceKind::Lambda => "lambda",
            ServiceKind::StaticSite => "static-site",
            ServiceKind::FileSystem => "file-system",
            ServiceKind::ExternalApi => "external-api",
            ServiceKind::Mock => "mock",
        }
    }

    /// Kinds whose data is worth backing up
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            ServiceKind::Database | ServiceKind::GraphDatabase | ServiceKind::FileSystem
        )
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseKindError::new("service kind", s))
    }
}
