//! Supervisor-facing side of the host
//!
//! [`SupervisorBridge`] turns start/stop/shutdown notifications into
//! controller calls. The SCM runner and the foreground console run both
//! drive the same bridge.

mod bridge;
mod interactive;

#[cfg(all(windows, feature = "service"))]
mod runner;

pub use bridge::{ReportedState, StatusReporter, SupervisorBridge, SupervisorEvent};
pub use interactive::{run_interactive, ConsoleReporter};

#[cfg(all(windows, feature = "service"))]
pub use runner::{run_service, DispatchOutcome, HostedService};
