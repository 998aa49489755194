//! Declarative failure-recovery policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the supervisor does when the service terminates unexpectedly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Take no action
    #[default]
    None,
    /// Restart the service
    RestartService,
    /// Reboot the host
    RestartHost,
    /// Run the configured external command
    RunCommand,
}

impl RecoveryAction {
    /// Every action, in numeric order
    pub const ALL: [RecoveryAction; 4] = [
        RecoveryAction::None,
        RecoveryAction::RestartService,
        RecoveryAction::RestartHost,
        RecoveryAction::RunCommand,
    ];
}

/// Failure actions for the first, second and subsequent failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryPolicy {
    pub first_failure: RecoveryAction,
    pub second_failure: RecoveryAction,
    pub subsequent_failure: RecoveryAction,

    /// Days without failure after which the failure count resets
    pub reset_window_days: u32,

    /// Delay applied before every action
    pub restart_wait_minutes: u32,

    /// Message broadcast before a host restart
    pub reboot_message: Option<String>,

    /// Command run by `RunCommand`
    pub command: Option<String>,

    /// Parameters appended to `command`
    pub command_args: Option<String>,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            first_failure: RecoveryAction::None,
            second_failure: RecoveryAction::None,
            subsequent_failure: RecoveryAction::None,
            reset_window_days: 0,
            restart_wait_minutes: 1,
            reboot_message: None,
            command: None,
            command_args: None,
        }
    }
}

impl RecoveryPolicy {
    /// Actions in slot order: first, second, subsequent
    pub fn actions(&self) -> [RecoveryAction; 3] {
        [
            self.first_failure,
            self.second_failure,
            self.subsequent_failure,
        ]
    }

    /// Whether any slot reboots the host
    pub fn requires_shutdown_privilege(&self) -> bool {
        self.actions().contains(&RecoveryAction::RestartHost)
    }

    pub fn reset_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.reset_window_days) * 86_400)
    }

    pub fn restart_wait(&self) -> Duration {
        Duration::from_secs(u64::from(self.restart_wait_minutes) * 60)
    }

    /// Full command line submitted to the supervisor
    pub fn command_line(&self) -> Option<String> {
        let command = self.command.as_deref().filter(|c| !c.is_empty())?;
        match self.command_args.as_deref().filter(|a| !a.is_empty()) {
            Some(args) => Some(format!("{} {}", command, args)),
            None => Some(command.to_string()),
        }
    }
}
