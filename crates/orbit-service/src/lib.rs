//! # Orbit Service - Service factory
//!
//! Turns a [`ServiceTarget`](orbit_types::ServiceTarget) into a [`Service`]:
//! the value platform adapters call back into for requirements, ports,
//! environment variables, health URLs and log sources.
//!
//! Requirements come from a [`ServicePreset`], refined by the
//! [`ServiceCatalog`] profile for the service name and then by any
//! `requirements` objects in the target and command configuration.

#![deny(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod factory;
pub mod preset;
pub mod service;

pub use catalog::{ServiceCatalog, ServiceProfile};
pub use error::{Result, ServiceError};
pub use factory::ServiceFactory;
pub use preset::ServicePreset;
pub use service::Service;
