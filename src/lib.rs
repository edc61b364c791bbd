//! Publish interdependent packages to a registry one at a time, in
//! dependency order, waiting between publishes for registry propagation.

pub mod clients;
pub mod core;
pub mod orchestration;
pub mod security;

pub use crate::clients::CommandPublishClient;
pub use crate::core::*;
pub use crate::orchestration::*;
pub use crate::security::{CommandError, SafeCommandExecutor};
