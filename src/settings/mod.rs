//! Service identity and registration settings

mod account;

pub use account::ServiceAccount;

use crate::error::{Result, ServiceError};
use crate::recovery::RecoveryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the supervisor starts the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    /// Started at boot
    #[default]
    Automatic,
    /// Started on demand
    Manual,
    /// Cannot be started
    Disabled,
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StartMode::Automatic => "automatic",
            StartMode::Manual => "manual",
            StartMode::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// A service that must be running for this service to run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceDependency(String);

impl ServiceDependency {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self(service_name.into())
    }

    /// Message Queuing
    pub fn msmq() -> Self {
        Self::new("MSMQ")
    }

    /// Default SQL Server instance
    pub fn sql_server() -> Self {
        Self::new("MSSQLSERVER")
    }

    /// Windows Event Log
    pub fn event_log() -> Self {
        Self::new("Eventlog")
    }

    /// World Wide Web Publishing Service
    pub fn iis() -> Self {
        Self::new("W3SVC")
    }

    pub fn service_name(&self) -> &str {
        &self.0
    }
}

/// Identity and registration settings of a hosted service
///
/// Built once by the hosting application before any registration call and
/// left untouched for the rest of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name, unique within the service registry
    pub name: String,

    /// Name shown in services.msc (empty = same as `name`)
    pub display_name: String,

    /// Description shown in services.msc
    pub description: String,

    /// Start mode, defaults to automatic
    pub start_mode: StartMode,

    /// Logon account, defaults to LocalSystem
    pub account: ServiceAccount,

    /// Services that must be running for this service to run
    pub dependencies: Vec<ServiceDependency>,

    /// Failure actions programmed into the supervisor at install time
    pub recovery: RecoveryPolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            display_name: String::new(),
            description: String::new(),
            start_mode: StartMode::Automatic,
            account: ServiceAccount::LocalSystem,
            dependencies: Vec::new(),
            recovery: RecoveryPolicy::default(),
        }
    }
}

impl ServiceSettings {
    /// Create settings with the given service name and defaults for the rest
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Display name, falling back to the service name
    pub fn effective_display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Dependency service names in declaration order, duplicates dropped
    pub fn dependency_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.dependencies.len());
        for dep in &self.dependencies {
            let name = dep.service_name();
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Check the settings before handing them to the registry
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::InvalidSettings(
                "service name must not be empty".into(),
            ));
        }
        if self.name.contains(['/', '\\']) {
            return Err(ServiceError::InvalidSettings(format!(
                "service name '{}' must not contain slashes",
                self.name
            )));
        }
        if self.dependencies.iter().any(|d| d.service_name().is_empty()) {
            return Err(ServiceError::InvalidSettings(
                "dependency names must not be empty".into(),
            ));
        }
        self.account.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryAction;

    #[test]
    fn test_defaults() {
        let settings = ServiceSettings::new("Mini");
        assert_eq!(settings.start_mode, StartMode::Automatic);
        assert_eq!(settings.account, ServiceAccount::LocalSystem);
        assert!(settings.dependencies.is_empty());
        assert_eq!(settings.recovery.first_failure, RecoveryAction::None);
        assert_eq!(settings.effective_display_name(), "Mini");
    }

    #[test]
    fn test_validate_name() {
        assert!(ServiceSettings::new("").validate().is_err());
        assert!(ServiceSettings::new("   ").validate().is_err());
        assert!(ServiceSettings::new("a\\b").validate().is_err());
        assert!(ServiceSettings::new("Mini").validate().is_ok());
    }

    #[test]
    fn test_dependency_names_dedup() {
        let mut settings = ServiceSettings::new("Mini");
        settings.dependencies = vec![
            ServiceDependency::event_log(),
            ServiceDependency::msmq(),
            ServiceDependency::new("EVENTLOG"),
        ];
        assert_eq!(settings.dependency_names(), vec!["Eventlog", "MSMQ"]);
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: ServiceSettings = toml::from_str(
            r#"
            name = "Mini"
            start_mode = "manual"
            dependencies = ["Eventlog"]

            [account]
            type = "network_service"

            [recovery]
            first_failure = "restart_service"
            reset_window_days = 2
            "#,
        )
        .unwrap();

        assert_eq!(settings.start_mode, StartMode::Manual);
        assert_eq!(settings.account, ServiceAccount::NetworkService);
        assert_eq!(settings.dependency_names(), vec!["Eventlog"]);
        assert_eq!(settings.recovery.first_failure, RecoveryAction::RestartService);
        assert_eq!(settings.recovery.reset_window_days, 2);
        assert_eq!(settings.recovery.restart_wait_minutes, 1);
    }
}
