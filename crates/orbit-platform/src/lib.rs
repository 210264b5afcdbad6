//! # Orbit Platform - Platform registry and adapters
//!
//! Every execution substrate implements the [`Platform`] trait: a fixed
//! operation set (start, stop, check, update, provision, publish, backup,
//! restore, exec, test, logs) that takes a [`Service`](orbit_service::Service)
//! and returns an [`OperationOutcome`].
//!
//! ## Contract
//!
//! - Unsupported operations return a failed outcome, never `Err`
//! - `Err(PlatformError)` means the operation faulted
//! - Side effects (subprocesses, HTTP, files) stay inside adapters
//!
//! ## Adapters
//!
//! - [`ProcessPlatform`]: bare processes, signals via `nix`
//! - [`ContainerPlatform`]: `docker` CLI
//! - [`CloudPlatform`]: `aws` CLI
//! - [`ExternalPlatform`]: HTTP health checks only
//! - [`MockPlatform`]: scriptable in-memory double

#![deny(unsafe_code)]

pub mod adapters;
pub mod error;
pub mod platform;
pub mod registry;
pub mod runner;

pub use adapters::{
    CloudPlatform, ContainerPlatform, ExternalPlatform, MockBehavior, MockCall, MockPlatform,
    ProcessPlatform,
};
pub use error::{PlatformError, Result};
pub use platform::{perform, OperationOutcome, Platform, PlatformContext};
pub use registry::PlatformRegistry;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ScriptedRunner, TokioCommandRunner};
