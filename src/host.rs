//! Service host: dispatches command-line verbs to the lifecycle pieces

use crate::config::{Args, Command, HostConfig};
use crate::error::{Result, ServiceError};
use crate::lifecycle::{CancellationToken, LifecycleController};
use crate::logging::init_console_logging;
use crate::scm::{
    self, require_elevation, ControlOutcome, Elevation, ElevationCheck, ServiceControl,
    ServiceRegistry,
};
use crate::service::run_interactive;
use crate::settings::{ServiceAccount, ServiceSettings};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Application callback run around install/uninstall
pub type Hook = Box<dyn FnOnce() -> anyhow::Result<()>>;

/// One-line result of a command-line verb
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Installed(String),
    Uninstalled(String),
    Control(String, ControlOutcome),
    /// The verb ran in an elevated copy of this process
    Relaunched,
    /// A foreground run finished
    Ran(String),
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Installed(name) => write!(f, "Service '{}' installed.", name),
            CommandOutcome::Uninstalled(name) => write!(f, "Service '{}' uninstalled.", name),
            CommandOutcome::Control(name, outcome) => match outcome {
                ControlOutcome::Started => write!(f, "Service '{}' started.", name),
                ControlOutcome::AlreadyRunning => {
                    write!(f, "Service '{}' is already running.", name)
                }
                ControlOutcome::Stopped => write!(f, "Service '{}' stopped.", name),
                ControlOutcome::AlreadyStopped => {
                    write!(f, "Service '{}' is not running.", name)
                }
                ControlOutcome::Relaunched => {
                    write!(f, "Command for '{}' ran as administrator.", name)
                }
            },
            CommandOutcome::Relaunched => write!(f, "Command ran as administrator."),
            CommandOutcome::Ran(name) => write!(f, "Service '{}' finished.", name),
        }
    }
}

/// Hosts one service: its settings, its worker and its install hooks
pub struct ServiceHost {
    settings: ServiceSettings,
    config: HostConfig,
    controller: Arc<LifecycleController>,
    on_install: Option<Hook>,
    on_uninstall: Option<Hook>,
}

impl ServiceHost {
    /// Create a host running `work` on the service worker thread
    pub fn new<F>(settings: ServiceSettings, work: F) -> Self
    where
        F: FnOnce(&CancellationToken) -> anyhow::Result<()> + Send + 'static,
    {
        let controller = Arc::new(LifecycleController::new(settings.name.clone(), work));
        Self {
            settings,
            config: HostConfig::default(),
            controller,
            on_install: None,
            on_uninstall: None,
        }
    }

    pub fn with_config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Run after the service was registered
    pub fn on_install<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.on_install = Some(Box::new(hook));
        self
    }

    /// Run before the service registration is removed
    pub fn on_uninstall<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.on_uninstall = Some(Box::new(hook));
        self
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn controller(&self) -> &Arc<LifecycleController> {
        &self.controller
    }

    /// Entry point for the hosting binary
    ///
    /// Without a verb the process hands itself to the service control
    /// manager, or runs in the foreground when it was not started by it.
    pub fn run(mut self, args: &Args) -> Result<Option<CommandOutcome>> {
        set_working_directory();

        match &args.command {
            None => {
                self.run_default(args)?;
                Ok(None)
            }
            Some(command) => {
                init_console_logging(args.log_level(), args.log.as_deref().map(Path::new))?;
                self.run_command(command).map(Some)
            }
        }
    }

    /// Execute one verb against the given supervisor collaborators
    pub fn execute<S, E>(
        &mut self,
        command: &Command,
        scm: &mut S,
        elevation: &E,
        executable: &Path,
    ) -> Result<CommandOutcome>
    where
        S: ServiceRegistry + ServiceControl + ?Sized,
        E: Elevation + ?Sized,
    {
        let name = self.settings.name.clone();

        match command {
            Command::Start => {
                let outcome =
                    scm::start_service(&*scm, elevation, &name, self.config.start_timeout())?;
                Ok(control_outcome(name, outcome))
            }
            Command::Stop => {
                let outcome =
                    scm::stop_service(&*scm, elevation, &name, self.config.stop_timeout())?;
                Ok(control_outcome(name, outcome))
            }
            Command::Install { account, password } => {
                if let Some(account) =
                    ServiceAccount::from_cli(account.as_deref(), password.as_deref())?
                {
                    self.settings.account = account;
                }

                if scm.is_installed(&name)? {
                    return Err(ServiceError::AlreadyInstalled(name));
                }
                if require_elevation(elevation, "installed")? == ElevationCheck::Relaunched {
                    return Ok(CommandOutcome::Relaunched);
                }

                scm::install(scm, &self.settings, executable)?;
                if let Some(hook) = self.on_install.take() {
                    hook().map_err(ServiceError::Hook)?;
                }
                Ok(CommandOutcome::Installed(name))
            }
            Command::Uninstall => {
                if !scm.is_installed(&name)? {
                    return Err(ServiceError::NotInstalled(name));
                }
                if require_elevation(elevation, "uninstalled")? == ElevationCheck::Relaunched {
                    return Ok(CommandOutcome::Relaunched);
                }

                if let Some(hook) = self.on_uninstall.take() {
                    hook().map_err(ServiceError::Hook)?;
                }
                scm::uninstall(scm, &name)?;
                Ok(CommandOutcome::Uninstalled(name))
            }
            Command::Run => {
                run_interactive(self.controller.clone())?;
                Ok(CommandOutcome::Ran(name))
            }
        }
    }

    #[cfg(all(windows, feature = "service"))]
    fn run_command(&mut self, command: &Command) -> Result<CommandOutcome> {
        use crate::scm::windows::{ScmManager, WindowsElevation};

        if *command == Command::Run {
            run_interactive(self.controller.clone())?;
            return Ok(CommandOutcome::Ran(self.settings.name.clone()));
        }

        let executable = std::env::current_exe()?;
        let mut scm = ScmManager::connect()?;
        self.execute(command, &mut scm, &WindowsElevation, &executable)
    }

    #[cfg(not(all(windows, feature = "service")))]
    fn run_command(&mut self, command: &Command) -> Result<CommandOutcome> {
        match command {
            Command::Run => {
                run_interactive(self.controller.clone())?;
                Ok(CommandOutcome::Ran(self.settings.name.clone()))
            }
            _ => Err(ServiceError::Unsupported("The service control manager")),
        }
    }

    #[cfg(all(windows, feature = "service"))]
    fn run_default(&mut self, args: &Args) -> Result<()> {
        use crate::service::{run_service, DispatchOutcome, HostedService};

        let hosted = HostedService {
            name: self.settings.name.clone(),
            controller: self.controller.clone(),
            config: self.config.clone(),
        };

        match run_service(hosted)? {
            DispatchOutcome::Completed => Ok(()),
            DispatchOutcome::NotUnderScm(_) => {
                init_console_logging(args.log_level(), args.log.as_deref().map(Path::new))?;
                info!("Not started by the service control manager, running in the foreground");
                run_interactive(self.controller.clone())
            }
        }
    }

    #[cfg(not(all(windows, feature = "service")))]
    fn run_default(&mut self, args: &Args) -> Result<()> {
        init_console_logging(args.log_level(), args.log.as_deref().map(Path::new))?;
        info!("Running '{}' in the foreground", self.settings.name);
        run_interactive(self.controller.clone())
    }
}

fn control_outcome(name: String, outcome: ControlOutcome) -> CommandOutcome {
    match outcome {
        ControlOutcome::Relaunched => CommandOutcome::Relaunched,
        other => CommandOutcome::Control(name, other),
    }
}

/// Services start in the system directory; run from the executable's instead
fn set_working_directory() {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    if let Some(dir) = exe_dir {
        if let Err(e) = std::env::set_current_dir(&dir) {
            warn!("Failed to change directory to {:?}: {}", dir, e);
        }
    }
}
