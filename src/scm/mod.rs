//! Service control manager collaborators
//!
//! The traits here are the seams between the host and the OS supervisor:
//! registration, state control and elevation. The Windows implementations
//! live in [`windows`]; tests drive the same code through in-memory stubs.

mod control;
mod elevation;
mod installer;

#[cfg(all(windows, feature = "service"))]
pub mod windows;

pub use control::{
    start_service, stop_service, wait_for_state, ControlOutcome, RunState, ServiceControl,
};
pub use elevation::{require_elevation, Elevation, ElevationCheck};
pub use installer::{install, uninstall, RegistrationRecord, ServiceRegistry};

#[cfg(test)]
pub(crate) mod testing;
