//! servicekit - host a long-running worker as a Windows service
//!
//! The worker runs on its own thread under a [`lifecycle::LifecycleController`]
//! and is stopped through cooperative cancellation. Installation registers
//! the executable with the service control manager and programs its
//! failure-recovery actions.

pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod logging;
pub mod recovery;
pub mod scm;
pub mod service;
pub mod settings;

pub use error::{Result, ServiceError};
pub use host::{CommandOutcome, ServiceHost};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
