//! Built-in platform adapters.

pub mod cloud;
pub mod container;
pub mod external;
pub mod mock;
pub mod process;

pub use cloud::CloudPlatform;
pub use container::ContainerPlatform;
pub use external::ExternalPlatform;
pub use mock::{MockBehavior, MockCall, MockPlatform};
pub use process::ProcessPlatform;
