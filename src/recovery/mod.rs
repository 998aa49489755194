//! Failure-recovery configuration
//!
//! A [`RecoveryPolicy`] is declared data: the supervisor executes it, this
//! module only serializes it and hands it over once at install time.

mod configurator;
mod policy;
mod record;

pub use configurator::{apply_recovery_policy, RecoveryTarget};
pub use policy::{RecoveryAction, RecoveryPolicy};
pub use record::{
    ActionCode, ActionRecord, FailureActionsRecord, ACTION_COUNT, ACTION_RECORD_SIZE,
    SERVICE_CONFIG_FAILURE_ACTIONS,
};

#[cfg(test)]
pub(crate) use configurator::tests::RecordingTarget;
