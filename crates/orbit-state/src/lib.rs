//! # Orbit State - Durable resource state
//!
//! Records what each service currently occupies (process id, container id,
//! cloud identifiers, endpoint) so that later invocations of the CLI can act
//! on real identifiers instead of rediscovering them.
//!
//! ## Key Components
//!
//! - [`ResourceStateStore`]: store interface keyed by (environment, service)
//! - [`FileStateStore`]: one JSON file per key under a state directory
//! - [`InMemoryStateStore`]: non-durable store for tests
//! - [`LivenessProbe`]: decides which entries `cleanup` may remove
//!
//! ## Semantics
//!
//! - `save` fully replaces prior state for the key
//! - `load` of a missing or corrupt entry is `None`, never an error
//! - `clear` of a missing entry succeeds

#![deny(unsafe_code)]

pub mod error;
pub mod file;
pub mod liveness;
pub mod memory;
pub mod store;

pub use error::{Result, StateError};
pub use file::FileStateStore;
pub use liveness::{Liveness, LivenessProbe, PidLivenessProbe};
pub use memory::InMemoryStateStore;
pub use store::ResourceStateStore;
