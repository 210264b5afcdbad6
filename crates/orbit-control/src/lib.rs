//! # Orbit Control - Handler registry and command dispatcher
//!
//! The core of orbit: maps (command, platform, service kind) to a handler
//! and applies a command across an ordered list of services, isolating
//! per-service failures.
//!
//! ## Key Components
//!
//! - [`HandlerRegistry`]: typed three-key handler lookup with `Any` fallback
//! - [`CommandDescriptor`]: defaults, hooks and validation for one command
//! - [`CommandDispatcher`]: sequential per-service execution loop
//! - [`ExecutionContext`]: what a handler sees for one service
//!
//! ## Example
//!
//! ```ignore
//! let dispatcher = CommandDispatcher::builder()
//!     .with_store(Arc::new(FileStateStore::new(invocation.state_dir())))
//!     .build()?;
//!
//! let results = dispatcher
//!     .run(CommandKind::Stop, targets, &CommandOptions::new(), &invocation)
//!     .await?;
//! if results.has_failures() {
//!     // inspect results.summary.failed
//! }
//! ```

#![deny(unsafe_code)]

pub mod builder;
pub mod commands;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod registry;

pub use builder::CommandDispatcherBuilder;
pub use commands::{descriptor_for, expand_virtual, CommandDescriptor};
pub use context::{CommandOptions, ExecutionContext};
pub use dispatcher::CommandDispatcher;
pub use error::{DispatchError, HandlerError, Result};
pub use handler::{handler_fn, Handler, HandlerDescriptor, HandlerFuture, KindSelector};
pub use handlers::register_builtin_handlers;
pub use registry::HandlerRegistry;
