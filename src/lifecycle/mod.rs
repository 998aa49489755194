//! In-process service lifecycle
//!
//! A [`LifecycleController`] runs a work closure on its own thread and turns
//! a stop request into cooperative cancellation through a
//! [`CancellationToken`].

mod cancel;
mod controller;

pub use cancel::{CancellationSource, CancellationToken, Cancelled};
pub use controller::{ControllerState, LifecycleController, WorkFn};
