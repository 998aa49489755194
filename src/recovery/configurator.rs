//! Programs the supervisor's auto-restart policy

use crate::error::Result;
use crate::recovery::{FailureActionsRecord, RecoveryPolicy};
use tracing::{debug, info};

/// A registered service whose failure actions can be changed
///
/// Implemented over a real service handle on Windows and by recording
/// stubs in tests. Calls against one target are never concurrent.
pub trait RecoveryTarget {
    /// Enable the host-shutdown privilege on the current process token
    fn acquire_shutdown_privilege(&mut self) -> Result<()>;

    /// Submit the record through the failure-actions configuration call
    fn submit_failure_actions(&mut self, record: &mut FailureActionsRecord) -> Result<()>;
}

/// Push a recovery policy into the supervisor
///
/// The shutdown privilege is requested only when a slot reboots the host,
/// and failing to get it aborts before anything is submitted. The record
/// is dropped on every path once the call returns.
pub fn apply_recovery_policy<T>(target: &mut T, policy: &RecoveryPolicy) -> Result<()>
where
    T: RecoveryTarget + ?Sized,
{
    if policy.requires_shutdown_privilege() {
        debug!("Policy reboots the host, acquiring shutdown privilege");
        target.acquire_shutdown_privilege()?;
    }

    let mut record = FailureActionsRecord::from_policy(policy)?;
    target.submit_failure_actions(&mut record)?;

    info!(
        "Recovery options set: {:?}, reset after {}s",
        policy.actions(),
        record.reset_period_secs()
    );
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::recovery::{ActionCode, ActionRecord, RecoveryAction};

    /// Records every call made against it
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingTarget {
        pub privilege_calls: usize,
        pub submitted: Vec<(u32, u32, Vec<ActionRecord>, Option<String>)>,
        pub fail_privilege: bool,
        pub fail_submit: Option<i32>,
    }

    impl RecoveryTarget for RecordingTarget {
        fn acquire_shutdown_privilege(&mut self) -> Result<()> {
            self.privilege_calls += 1;
            if self.fail_privilege {
                return Err(ServiceError::Privilege {
                    privilege: "SeShutdownPrivilege".into(),
                    code: 1300,
                });
            }
            Ok(())
        }

        fn submit_failure_actions(&mut self, record: &mut FailureActionsRecord) -> Result<()> {
            self.submitted.push((
                record.reset_period_secs(),
                record.action_count(),
                record.actions().to_vec(),
                record.command(),
            ));
            match self.fail_submit {
                Some(code) => Err(ServiceError::config(
                    "Unable to change the service configuration",
                    code,
                )),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn test_privilege_only_for_host_restart() {
        for &first in &RecoveryAction::ALL {
            for &second in &RecoveryAction::ALL {
                for &subsequent in &RecoveryAction::ALL {
                    let policy = RecoveryPolicy {
                        first_failure: first,
                        second_failure: second,
                        subsequent_failure: subsequent,
                        ..RecoveryPolicy::default()
                    };
                    let mut target = RecordingTarget::default();
                    apply_recovery_policy(&mut target, &policy).unwrap();

                    let reboots =
                        [first, second, subsequent].contains(&RecoveryAction::RestartHost);
                    assert_eq!(target.privilege_calls, usize::from(reboots));
                    assert_eq!(target.submitted.len(), 1);
                    assert_eq!(target.submitted[0].1, 3);
                }
            }
        }
    }

    #[test]
    fn test_privilege_failure_is_fatal() {
        let policy = RecoveryPolicy {
            subsequent_failure: RecoveryAction::RestartHost,
            ..RecoveryPolicy::default()
        };
        let mut target = RecordingTarget {
            fail_privilege: true,
            ..RecordingTarget::default()
        };

        let err = apply_recovery_policy(&mut target, &policy).unwrap_err();
        assert!(matches!(err, ServiceError::Privilege { .. }));
        assert!(target.submitted.is_empty());
    }

    #[test]
    fn test_submit_failure_carries_os_code() {
        let mut target = RecordingTarget {
            fail_submit: Some(5),
            ..RecordingTarget::default()
        };

        let err = apply_recovery_policy(&mut target, &RecoveryPolicy::default()).unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(err.os_code(), Some(5));
    }

    #[test]
    fn test_submitted_record() {
        let policy = RecoveryPolicy {
            first_failure: RecoveryAction::RunCommand,
            reset_window_days: 1,
            restart_wait_minutes: 2,
            command: Some("notify.exe".into()),
            ..RecoveryPolicy::default()
        };
        let mut target = RecordingTarget::default();
        apply_recovery_policy(&mut target, &policy).unwrap();

        let (reset, count, actions, command) = &target.submitted[0];
        assert_eq!(*reset, 86_400);
        assert_eq!(*count, 3);
        assert_eq!(actions[0].code, ActionCode::RunCommand as u32);
        assert_eq!(actions[1].code, ActionCode::None as u32);
        assert_eq!(actions[2].delay_ms, 120_000);
        assert_eq!(command.as_deref(), Some("notify.exe"));
    }
}
