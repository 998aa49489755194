//! Command line and host configuration

mod args;
mod host;

pub use args::{Args, Command};
pub use host::{ConfigError, HostConfig};
