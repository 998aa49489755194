//! Administrative-rights collaborator

use crate::error::{Result, ServiceError};
use tracing::info;

/// Checks for and obtains the administrative role
pub trait Elevation {
    fn is_elevated(&self) -> bool;

    /// Re-run the current command line elevated and wait for it to finish
    ///
    /// Returns `false` when no elevated copy could be launched.
    fn relaunch_elevated(&self) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationCheck {
    /// This process may proceed
    Elevated,
    /// An elevated copy ran the command; this process should return
    Relaunched,
}

/// Require administrative rights for `operation` ("installed", "started", ...)
pub fn require_elevation<E>(elevation: &E, operation: &'static str) -> Result<ElevationCheck>
where
    E: Elevation + ?Sized,
{
    if elevation.is_elevated() {
        return Ok(ElevationCheck::Elevated);
    }

    info!("Administrator rights required, relaunching elevated");
    if elevation.relaunch_elevated()? {
        Ok(ElevationCheck::Relaunched)
    } else {
        Err(ServiceError::NotElevated { operation })
    }
}
