//! Orbit Types - Core types for command dispatch and resource state
//!
//! Orbit applies one logical lifecycle action (start, stop, backup, ...)
//! uniformly to named services, whatever platform each of them runs on.
//!
//! ## Key Concepts
//!
//! - **ServiceTarget**: one logical service on one platform, plus free-form config
//! - **ServiceRequirements**: declarative needs of a service, merged from layers
//! - **HandlerOutput**: raw result of a handler
//! - **CommandResult**: typed outcome for one service
//! - **CommandResults**: envelope for a whole invocation, with summary counts
//! - **ResourceState**: persisted record of what a service currently occupies
//! - **InvocationConfig**: explicit per-invocation configuration

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod envelope;
pub mod error;
pub mod kinds;
pub mod requirements;
pub mod resource;
pub mod result;
pub mod target;

// Re-export main types
pub use config::{InvocationConfig, DEFAULT_ENVIRONMENT, DEFAULT_STATE_DIR};
pub use envelope::{CommandResults, ExecutionInfo, ResultSummary};
pub use error::ParseKindError;
pub use kinds::{CommandKind, PlatformKind, ServiceKind};
pub use requirements::{
    ComputeRequirements, NetworkRequirements, Protocol, SecurityRequirements,
    ServiceRequirements, StorageVolume,
};
pub use resource::{PlatformResources, ResourceState};
pub use result::{
    BackupPayload, CheckPayload, CommandPayload, CommandResult, ErrorKind, ExecPayload,
    HandlerOutput, LogsPayload, RestorePayload, StartPayload, StopPayload, TestPayload,
};
pub use target::{merge_config, ConfigMap, ServiceTarget};
