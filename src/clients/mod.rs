pub mod command_client;

pub use command_client::{CommandPublishClient, is_already_published};
