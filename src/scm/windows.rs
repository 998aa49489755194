//! Windows service control manager implementations

use crate::error::{Result, ServiceError};
use crate::recovery::{self, FailureActionsRecord, RecoveryTarget, ACTION_RECORD_SIZE};
use crate::scm::{Elevation, RegistrationRecord, RunState, ServiceControl, ServiceRegistry};
use crate::settings::StartMode;
use std::ffi::{c_void, OsStr, OsString};
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use tracing::{debug, info, warn};
use windows::core::{w, PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_NOT_ALL_ASSIGNED, HANDLE, LUID};
use windows::Win32::Security::{
    AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED,
    SE_SHUTDOWN_NAME, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows::Win32::System::Services::{
    ChangeServiceConfig2W, CloseServiceHandle, OpenSCManagerW, OpenServiceW, SC_ACTION,
    SC_HANDLE, SC_MANAGER_CONNECT, SERVICE_CHANGE_CONFIG, SERVICE_CONFIG_FAILURE_ACTIONS,
    SERVICE_FAILURE_ACTIONSW, SERVICE_START,
};
use windows::Win32::System::Threading::{
    GetCurrentProcess, OpenProcessToken, WaitForSingleObject, INFINITE,
};
use windows::Win32::UI::Shell::{
    IsUserAnAdmin, ShellExecuteExW, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW,
};
use windows::Win32::UI::WindowsAndMessaging::SW_HIDE;
use windows_service::service::{
    ServiceAccess, ServiceDependency, ServiceErrorControl, ServiceInfo, ServiceStartType,
    ServiceState, ServiceType,
};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

const _: () = assert!(std::mem::size_of::<SC_ACTION>() == ACTION_RECORD_SIZE);
const _: () =
    assert!(SERVICE_CONFIG_FAILURE_ACTIONS.0 == recovery::SERVICE_CONFIG_FAILURE_ACTIONS);

/// `ERROR_SERVICE_DOES_NOT_EXIST`
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;

/// Connection to the local service control manager
pub struct ScmManager {
    manager: ServiceManager,
}

impl ScmManager {
    /// Connect with rights to query and control services
    ///
    /// Works without administrative rights; `register` reconnects with
    /// create rights when it needs them.
    pub fn connect() -> Result<Self> {
        let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)?;
        Ok(Self { manager })
    }
}

impl ServiceRegistry for ScmManager {
    type Target = ScmRecoveryTarget;

    fn is_installed(&self, name: &str) -> Result<bool> {
        match self.manager.open_service(name, ServiceAccess::QUERY_STATUS) {
            Ok(_) => Ok(true),
            Err(windows_service::Error::Winapi(e))
                if e.raw_os_error() == Some(ERROR_SERVICE_DOES_NOT_EXIST) =>
            {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn register(&mut self, record: &RegistrationRecord) -> Result<ScmRecoveryTarget> {
        let info = ServiceInfo {
            name: OsString::from(&record.name),
            display_name: OsString::from(&record.display_name),
            service_type: ServiceType::OWN_PROCESS,
            start_type: start_type(record.start_mode),
            error_control: ServiceErrorControl::Normal,
            executable_path: record.executable.clone(),
            launch_arguments: Vec::new(),
            dependencies: record
                .dependencies
                .iter()
                .map(|d| ServiceDependency::Service(OsString::from(d)))
                .collect(),
            account_name: record.account_name.as_ref().map(OsString::from),
            account_password: record.account_password.as_ref().map(OsString::from),
        };

        let creator = ServiceManager::local_computer(
            None::<&str>,
            ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
        )?;
        let service = creator.create_service(&info, ServiceAccess::CHANGE_CONFIG)?;
        if !record.description.is_empty() {
            service.set_description(&record.description)?;
        }
        drop(service);

        ScmRecoveryTarget::open(&record.name)
    }

    fn unregister(&mut self, name: &str) -> Result<()> {
        let access = ServiceAccess::QUERY_STATUS | ServiceAccess::STOP | ServiceAccess::DELETE;
        let service = self.manager.open_service(name, access)?;

        if service.query_status()?.current_state != ServiceState::Stopped {
            info!("Stopping '{}' before removal", name);
            if let Err(e) = service.stop() {
                warn!("Failed to stop '{}': {}", name, e);
            }
        }

        service.delete()?;
        Ok(())
    }
}

impl ServiceControl for ScmManager {
    fn query_state(&self, name: &str) -> Result<RunState> {
        let service = self.manager.open_service(name, ServiceAccess::QUERY_STATUS)?;
        Ok(run_state(service.query_status()?.current_state))
    }

    fn request_start(&self, name: &str) -> Result<()> {
        let service = self.manager.open_service(name, ServiceAccess::START)?;
        service.start(&[] as &[&OsStr])?;
        Ok(())
    }

    fn request_stop(&self, name: &str) -> Result<()> {
        let service = self.manager.open_service(name, ServiceAccess::STOP)?;
        service.stop()?;
        Ok(())
    }
}

fn start_type(mode: StartMode) -> ServiceStartType {
    match mode {
        StartMode::Automatic => ServiceStartType::AutoStart,
        StartMode::Manual => ServiceStartType::OnDemand,
        StartMode::Disabled => ServiceStartType::Disabled,
    }
}

fn run_state(state: ServiceState) -> RunState {
    match state {
        ServiceState::Stopped => RunState::Stopped,
        ServiceState::StartPending => RunState::StartPending,
        ServiceState::StopPending => RunState::StopPending,
        ServiceState::Running => RunState::Running,
        ServiceState::ContinuePending => RunState::ContinuePending,
        ServiceState::PausePending => RunState::PausePending,
        ServiceState::Paused => RunState::Paused,
    }
}

/// Closes a service or manager handle on drop
struct ScHandle(SC_HANDLE);

impl Drop for ScHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseServiceHandle(self.0);
        }
    }
}

/// Closes a kernel handle on drop
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// Service handle opened with configuration rights
pub struct ScmRecoveryTarget {
    service: ScHandle,
    _manager: ScHandle,
}

impl ScmRecoveryTarget {
    pub fn open(name: &str) -> Result<Self> {
        let name = to_wide(OsStr::new(name));

        let manager = unsafe { OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT) }
            .map_err(|e| os_error("Unable to open the service control manager", &e))?;
        let manager = ScHandle(manager);

        let service = unsafe {
            OpenServiceW(
                manager.0,
                PCWSTR(name.as_ptr()),
                SERVICE_CHANGE_CONFIG | SERVICE_START,
            )
        }
        .map_err(|e| os_error("Unable to open the service", &e))?;

        Ok(Self {
            service: ScHandle(service),
            _manager: manager,
        })
    }
}

impl RecoveryTarget for ScmRecoveryTarget {
    fn acquire_shutdown_privilege(&mut self) -> Result<()> {
        enable_shutdown_privilege()
    }

    fn submit_failure_actions(&mut self, record: &mut FailureActionsRecord) -> Result<()> {
        let parts = record.raw_parts();
        let info = SERVICE_FAILURE_ACTIONSW {
            dwResetPeriod: parts.reset_period_secs,
            lpRebootMsg: PWSTR(parts.reboot_message),
            lpCommand: PWSTR(parts.command),
            cActions: parts.action_count,
            lpsaActions: parts.actions.cast::<SC_ACTION>(),
        };

        debug!("Submitting failure actions ({} entries)", info.cActions);
        unsafe {
            ChangeServiceConfig2W(
                self.service.0,
                SERVICE_CONFIG_FAILURE_ACTIONS,
                Some(&info as *const SERVICE_FAILURE_ACTIONSW as *const c_void),
            )
        }
        .map_err(|e| os_error("Unable to change the service configuration", &e))
    }
}

/// Enable `SeShutdownPrivilege` on the current process token
fn enable_shutdown_privilege() -> Result<()> {
    let privilege_error = |e: &windows::core::Error| ServiceError::Privilege {
        privilege: "SeShutdownPrivilege".to_string(),
        code: win32_code(e),
    };

    let mut token = HANDLE::default();
    unsafe {
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut token,
        )
    }
    .map_err(|e| privilege_error(&e))?;
    let token = OwnedHandle(token);

    let mut luid = LUID::default();
    unsafe { LookupPrivilegeValueW(PCWSTR::null(), SE_SHUTDOWN_NAME, &mut luid) }
        .map_err(|e| privilege_error(&e))?;

    let privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    unsafe { AdjustTokenPrivileges(token.0, false, Some(&privileges), 0, None, None) }
        .map_err(|e| privilege_error(&e))?;

    // AdjustTokenPrivileges succeeds even when the token lacks the privilege
    let last = unsafe { GetLastError() };
    if last == ERROR_NOT_ALL_ASSIGNED {
        return Err(ServiceError::Privilege {
            privilege: "SeShutdownPrivilege".to_string(),
            code: last.0 as i32,
        });
    }

    debug!("Shutdown privilege enabled");
    Ok(())
}

/// Administrator check and `runas` relaunch
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsElevation;

impl Elevation for WindowsElevation {
    fn is_elevated(&self) -> bool {
        unsafe { IsUserAnAdmin() }.as_bool()
    }

    fn relaunch_elevated(&self) -> Result<bool> {
        let exe = std::env::current_exe()?;
        let cwd = std::env::current_dir()?;
        let params = join_args(std::env::args_os().skip(1));

        let file = to_wide(exe.as_os_str());
        let params = to_wide(&params);
        let dir = to_wide(cwd.as_os_str());

        let mut info = SHELLEXECUTEINFOW {
            cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
            fMask: SEE_MASK_NOCLOSEPROCESS,
            lpVerb: w!("runas"),
            lpFile: PCWSTR(file.as_ptr()),
            lpParameters: PCWSTR(params.as_ptr()),
            lpDirectory: PCWSTR(dir.as_ptr()),
            nShow: SW_HIDE.0,
            ..Default::default()
        };

        if let Err(e) = unsafe { ShellExecuteExW(&mut info) } {
            warn!("Relaunch as administrator failed: {}", e);
            return Ok(false);
        }

        if !info.hProcess.is_invalid() {
            let process = OwnedHandle(info.hProcess);
            unsafe {
                WaitForSingleObject(process.0, INFINITE);
            }
        }
        Ok(true)
    }
}

const SPACE: u16 = b' ' as u16;
const TAB: u16 = b'\t' as u16;
const QUOTE: u16 = b'"' as u16;
const BACKSLASH: u16 = b'\\' as u16;

/// Quote one argument for the relaunch command line, keeping non-Unicode units
fn quote_arg(arg: &OsStr) -> Vec<u16> {
    let units: Vec<u16> = arg.encode_wide().collect();
    if !units.is_empty() && !units.iter().any(|u| matches!(*u, SPACE | TAB | QUOTE)) {
        return units;
    }

    let mut quoted = Vec::with_capacity(units.len() + 2);
    quoted.push(QUOTE);
    for unit in units {
        if unit == QUOTE {
            quoted.push(BACKSLASH);
        }
        quoted.push(unit);
    }
    quoted.push(QUOTE);
    quoted
}

fn join_args<I>(args: I) -> OsString
where
    I: IntoIterator<Item = OsString>,
{
    let mut line = Vec::new();
    for (i, arg) in args.into_iter().enumerate() {
        if i > 0 {
            line.push(SPACE);
        }
        line.extend(quote_arg(&arg));
    }
    OsString::from_wide(&line)
}

fn to_wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// Win32 error code behind an HRESULT-wrapped error
fn win32_code(e: &windows::core::Error) -> i32 {
    let hr = e.code().0;
    if (hr as u32) & 0xFFFF_0000 == 0x8007_0000 {
        hr & 0xFFFF
    } else {
        hr
    }
}

fn os_error(context: &str, e: &windows::core::Error) -> ServiceError {
    ServiceError::config(context, win32_code(e))
}
