//! Windows Service runner implementation

use crate::config::HostConfig;
use crate::error::Result;
use crate::lifecycle::LifecycleController;
use crate::logging::init_service_logging;
use crate::service::{ReportedState, StatusReporter, SupervisorBridge, SupervisorEvent};
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use windows_service::{
    define_windows_service,
    service::{
        ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
        ServiceType,
    },
    service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle},
    service_dispatcher,
};

const SERVICE_TYPE: ServiceType = ServiceType::OWN_PROCESS;

/// `ERROR_FAILED_SERVICE_CONTROLLER_CONNECT`: not started by the SCM
const ERROR_FAILED_SERVICE_CONTROLLER_CONNECT: i32 = 1063;

/// Service waiting to be picked up by the dispatcher thread
///
/// The dispatcher calls a plain `extern "system"` entry point, so the
/// service is parked here between `run_service` and `service_main`.
static PENDING: Mutex<Option<HostedService>> = Mutex::new(None);

/// Everything `service_main` needs to run one service
pub struct HostedService {
    pub name: String,
    pub controller: Arc<LifecycleController>,
    pub config: HostConfig,
}

/// How the dispatcher run ended
pub enum DispatchOutcome {
    /// The SCM ran the service to completion
    Completed,
    /// The process was not started by the SCM; the service is handed back
    NotUnderScm(HostedService),
}

/// Register with the Service Control Manager and block until the service stops
pub fn run_service(hosted: HostedService) -> Result<DispatchOutcome> {
    let name = hosted.name.clone();
    *PENDING.lock() = Some(hosted);

    match service_dispatcher::start(&name, ffi_service_main) {
        Ok(()) => Ok(DispatchOutcome::Completed),
        Err(windows_service::Error::Winapi(e))
            if e.raw_os_error() == Some(ERROR_FAILED_SERVICE_CONTROLLER_CONNECT) =>
        {
            match PENDING.lock().take() {
                Some(hosted) => Ok(DispatchOutcome::NotUnderScm(hosted)),
                None => Ok(DispatchOutcome::Completed),
            }
        }
        Err(e) => Err(e.into()),
    }
}

// Generate the Windows service entry point
define_windows_service!(ffi_service_main, service_main);

/// Service main function called by the Windows Service Control Manager
fn service_main(_arguments: Vec<OsString>) {
    let Some(hosted) = PENDING.lock().take() else {
        return;
    };
    if let Err(e) = run_service_main(hosted) {
        error!("Service error: {}", e);
    }
}

fn run_service_main(hosted: HostedService) -> Result<()> {
    init_service_logging(&hosted.config);
    info!("Starting {} service", hosted.name);

    let (tx, rx) = bounded::<SupervisorEvent>(8);

    let status_handle = service_control_handler::register(
        &hosted.name,
        move |control_event| -> ServiceControlHandlerResult {
            match control_event {
                ServiceControl::Stop => {
                    let _ = tx.try_send(SupervisorEvent::Stop);
                    ServiceControlHandlerResult::NoError
                }
                ServiceControl::Shutdown => {
                    let _ = tx.try_send(SupervisorEvent::Shutdown);
                    ServiceControlHandlerResult::NoError
                }
                ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
                _ => ServiceControlHandlerResult::NotImplemented,
            }
        },
    )?;

    let mut reporter = ScmReporter {
        handle: status_handle,
        checkpoint: 0,
        stop_wait_hint: hosted.config.stop_timeout(),
    };
    SupervisorBridge::new(hosted.controller).run(&rx, &mut reporter)?;

    info!("Service stopped");
    Ok(())
}

/// Forwards bridge states to the SCM
struct ScmReporter {
    handle: ServiceStatusHandle,
    checkpoint: u32,
    stop_wait_hint: Duration,
}

impl StatusReporter for ScmReporter {
    fn report(&mut self, state: ReportedState) -> Result<()> {
        let (current_state, controls_accepted, exit_code, wait_hint) = match state {
            ReportedState::StartPending => (
                ServiceState::StartPending,
                ServiceControlAccept::empty(),
                0,
                Duration::from_secs(10),
            ),
            ReportedState::Running => (
                ServiceState::Running,
                ServiceControlAccept::STOP | ServiceControlAccept::SHUTDOWN,
                0,
                Duration::default(),
            ),
            ReportedState::StopPending => (
                ServiceState::StopPending,
                ServiceControlAccept::empty(),
                0,
                self.stop_wait_hint,
            ),
            ReportedState::Stopped { exit_code } => (
                ServiceState::Stopped,
                ServiceControlAccept::empty(),
                exit_code,
                Duration::default(),
            ),
        };

        let checkpoint = match current_state {
            ServiceState::StartPending | ServiceState::StopPending => {
                self.checkpoint += 1;
                self.checkpoint
            }
            _ => 0,
        };

        self.handle.set_service_status(ServiceStatus {
            service_type: SERVICE_TYPE,
            current_state,
            controls_accepted,
            exit_code: ServiceExitCode::Win32(exit_code),
            checkpoint,
            wait_hint,
            process_id: None,
        })?;
        Ok(())
    }
}
