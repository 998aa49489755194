//! Fixed-layout failure-actions record
//!
//! The supervisor takes failure actions as a `SERVICE_FAILURE_ACTIONSW`
//! structure pointing at a contiguous array of `SC_ACTION` entries:
//!
//! ```text
//! action buffer (ACTION_COUNT entries, stride ACTION_RECORD_SIZE)
//!   +0  u32  action code (0 none, 1 restart service, 2 reboot, 3 run command)
//!   +4  u32  delay before the action, milliseconds
//!
//! header (pointer fields are pointer-aligned)
//!   dwResetPeriod  u32      seconds without failure before the count resets
//!   lpRebootMsg    *u16     NUL-terminated UTF-16, null = unset
//!   lpCommand      *u16     NUL-terminated UTF-16, null = unset
//!   cActions       u32      always ACTION_COUNT
//!   lpsaActions    *action  the action buffer
//! ```
//!
//! [`FailureActionsRecord`] owns every buffer the header points at, so the
//! whole record is released when it goes out of scope whether or not the
//! configuration call succeeded.

use crate::error::{Result, ServiceError};
use crate::recovery::{RecoveryAction, RecoveryPolicy};
use tracing::debug;

/// Number of action slots: first, second and subsequent failure
pub const ACTION_COUNT: usize = 3;

/// Size in bytes of one serialized action entry
pub const ACTION_RECORD_SIZE: usize = 8;

/// Configuration level selecting the failure-actions record
pub const SERVICE_CONFIG_FAILURE_ACTIONS: u32 = 2;

/// Numeric action codes understood by the supervisor
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCode {
    None = 0,
    Restart = 1,
    Reboot = 2,
    RunCommand = 3,
}

impl From<RecoveryAction> for ActionCode {
    fn from(action: RecoveryAction) -> Self {
        match action {
            RecoveryAction::None => ActionCode::None,
            RecoveryAction::RestartService => ActionCode::Restart,
            RecoveryAction::RestartHost => ActionCode::Reboot,
            RecoveryAction::RunCommand => ActionCode::RunCommand,
        }
    }
}

impl TryFrom<u32> for ActionCode {
    type Error = u32;

    fn try_from(code: u32) -> std::result::Result<Self, u32> {
        match code {
            0 => Ok(ActionCode::None),
            1 => Ok(ActionCode::Restart),
            2 => Ok(ActionCode::Reboot),
            3 => Ok(ActionCode::RunCommand),
            other => Err(other),
        }
    }
}

/// One action entry, laid out exactly like `SC_ACTION`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRecord {
    pub code: u32,
    pub delay_ms: u32,
}

impl ActionRecord {
    fn new(action: RecoveryAction, delay_ms: u32) -> Self {
        Self {
            code: ActionCode::from(action) as u32,
            delay_ms,
        }
    }

    /// Little-endian bytes at the documented offsets
    pub fn to_bytes(&self) -> [u8; ACTION_RECORD_SIZE] {
        let mut bytes = [0u8; ACTION_RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.code.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.delay_ms.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: [u8; ACTION_RECORD_SIZE]) -> Self {
        Self {
            code: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            delay_ms: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

/// Serialized failure-actions record ready for submission
#[derive(Debug)]
pub struct FailureActionsRecord {
    reset_period_secs: u32,
    reboot_message: Option<Vec<u16>>,
    command: Option<Vec<u16>>,
    actions: Box<[ActionRecord; ACTION_COUNT]>,
}

impl FailureActionsRecord {
    /// Build the record for a policy
    ///
    /// A `None` action still occupies its slot so positions stay aligned.
    pub fn from_policy(policy: &RecoveryPolicy) -> Result<Self> {
        let reset_period_secs = policy.reset_window_days.checked_mul(86_400).ok_or_else(|| {
            ServiceError::InvalidSettings(format!(
                "reset window of {} days does not fit the failure-actions record",
                policy.reset_window_days
            ))
        })?;

        let delay_ms = policy.restart_wait_minutes.checked_mul(60_000).ok_or_else(|| {
            ServiceError::InvalidSettings(format!(
                "restart wait of {} minutes does not fit the failure-actions record",
                policy.restart_wait_minutes
            ))
        })?;

        let [first, second, subsequent] = policy.actions();
        let actions = Box::new([
            ActionRecord::new(first, delay_ms),
            ActionRecord::new(second, delay_ms),
            ActionRecord::new(subsequent, delay_ms),
        ]);

        debug!(
            "Failure actions: {:?}/{:?}/{:?} after {}ms, reset after {}s",
            first, second, subsequent, delay_ms, reset_period_secs
        );

        Ok(Self {
            reset_period_secs,
            reboot_message: policy.reboot_message.as_deref().map(to_wide),
            command: policy.command_line().as_deref().map(to_wide),
            actions,
        })
    }

    pub fn reset_period_secs(&self) -> u32 {
        self.reset_period_secs
    }

    pub fn action_count(&self) -> u32 {
        self.actions.len() as u32
    }

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions[..]
    }

    /// The action buffer as it is laid out in memory
    pub fn action_bytes(&self) -> [u8; ACTION_COUNT * ACTION_RECORD_SIZE] {
        let mut buffer = [0u8; ACTION_COUNT * ACTION_RECORD_SIZE];
        for (i, action) in self.actions.iter().enumerate() {
            let offset = i * ACTION_RECORD_SIZE;
            buffer[offset..offset + ACTION_RECORD_SIZE].copy_from_slice(&action.to_bytes());
        }
        buffer
    }

    pub fn reboot_message(&self) -> Option<String> {
        self.reboot_message.as_deref().map(from_wide)
    }

    pub fn command(&self) -> Option<String> {
        self.command.as_deref().map(from_wide)
    }

    /// Raw pointers for the header, valid while `self` is alive and unmoved
    #[cfg_attr(not(windows), allow(dead_code))]
    pub(crate) fn raw_parts(&mut self) -> RawParts {
        RawParts {
            reset_period_secs: self.reset_period_secs,
            reboot_message: wide_ptr(&mut self.reboot_message),
            command: wide_ptr(&mut self.command),
            action_count: self.actions.len() as u32,
            actions: self.actions.as_mut_ptr(),
        }
    }
}

/// Header fields as handed to the configuration call
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) struct RawParts {
    pub reset_period_secs: u32,
    pub reboot_message: *mut u16,
    pub command: *mut u16,
    pub action_count: u32,
    pub actions: *mut ActionRecord,
}

fn wide_ptr(s: &mut Option<Vec<u16>>) -> *mut u16 {
    s.as_mut()
        .map_or(std::ptr::null_mut(), |w| w.as_mut_ptr())
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn from_wide(w: &[u16]) -> String {
    let end = w.iter().position(|&c| c == 0).unwrap_or(w.len());
    String::from_utf16_lossy(&w[..end])
}
