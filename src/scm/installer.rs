//! Install/uninstall transaction

use crate::error::{Result, ServiceError};
use crate::recovery::{apply_recovery_policy, RecoveryTarget};
use crate::settings::{ServiceSettings, StartMode};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Core registration record written to the service registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub start_mode: StartMode,
    /// `None` runs the service as LocalSystem
    pub account_name: Option<String>,
    pub account_password: Option<String>,
    pub dependencies: Vec<String>,
    pub executable: PathBuf,
}

impl RegistrationRecord {
    pub fn from_settings(settings: &ServiceSettings, executable: &Path) -> Self {
        Self {
            name: settings.name.clone(),
            display_name: settings.effective_display_name().to_string(),
            description: settings.description.clone(),
            start_mode: settings.start_mode,
            account_name: settings.account.account_name(),
            account_password: settings.account.password().map(str::to_string),
            dependencies: settings.dependency_names(),
            executable: executable.to_path_buf(),
        }
    }
}

/// The OS service registry
pub trait ServiceRegistry {
    /// Handle used to program failure actions on a freshly registered service
    type Target: RecoveryTarget;

    fn is_installed(&self, name: &str) -> Result<bool>;

    /// Commit the core registration record
    fn register(&mut self, record: &RegistrationRecord) -> Result<Self::Target>;

    /// Remove the service, stopping it first if needed
    fn unregister(&mut self, name: &str) -> Result<()>;
}

/// Register the service and program its recovery policy
///
/// Recovery configuration runs exactly once, right after the registration
/// record is committed. If it fails the registration is removed again and
/// the configuration error is returned.
pub fn install<R>(registry: &mut R, settings: &ServiceSettings, executable: &Path) -> Result<()>
where
    R: ServiceRegistry + ?Sized,
{
    settings.validate()?;

    if registry.is_installed(&settings.name)? {
        return Err(ServiceError::AlreadyInstalled(settings.name.clone()));
    }

    let record = RegistrationRecord::from_settings(settings, executable);
    info!(
        "Registering service '{}' ({}, start mode {})",
        record.name, record.display_name, record.start_mode
    );
    let mut target = registry.register(&record)?;

    if let Err(e) = apply_recovery_policy(&mut target, &settings.recovery) {
        drop(target);
        warn!("Recovery configuration failed, rolling back '{}'", settings.name);
        if let Err(rollback) = registry.unregister(&settings.name) {
            warn!("Rollback of '{}' failed: {}", settings.name, rollback);
        }
        return Err(e);
    }

    info!("Service '{}' installed", settings.name);
    Ok(())
}

/// Remove the service registration
pub fn uninstall<R>(registry: &mut R, name: &str) -> Result<()>
where
    R: ServiceRegistry + ?Sized,
{
    if !registry.is_installed(name)? {
        return Err(ServiceError::NotInstalled(name.to_string()));
    }

    registry.unregister(name)?;
    info!("Service '{}' uninstalled", name);
    Ok(())
}
