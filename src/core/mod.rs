pub mod config;
pub mod config_loader;
pub mod error;
pub mod package;
pub mod telemetry;
pub mod traits;

pub use config::*;
pub use config_loader::*;
pub use error::*;
pub use package::*;
pub use telemetry::*;
pub use traits::*;
