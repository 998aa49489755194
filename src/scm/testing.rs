//! In-memory supervisor stubs shared by the scm and host tests

use crate::error::{Result, ServiceError};
use crate::recovery::{FailureActionsRecord, RecordingTarget, RecoveryTarget};
use crate::scm::{Elevation, RegistrationRecord, RunState, ServiceControl, ServiceRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) struct FakeService {
    pub record: Option<RegistrationRecord>,
    pub state: RunState,
}

/// Service registry and control stub
#[derive(Default)]
pub(crate) struct FakeScm {
    pub services: Mutex<HashMap<String, FakeService>>,
    pub target: Arc<Mutex<RecordingTarget>>,
    pub fail_submit: Option<i32>,
    /// Pending states never complete
    pub stuck: bool,
    pub log: Mutex<Vec<String>>,
}

impl FakeScm {
    pub fn with_service(name: &str, state: RunState) -> Self {
        let scm = Self::default();
        scm.services.lock().insert(
            name.to_string(),
            FakeService {
                record: None,
                state,
            },
        );
        scm
    }

    pub fn registered(&self, name: &str) -> Option<RegistrationRecord> {
        self.services.lock().get(name).and_then(|s| s.record.clone())
    }

    pub fn state_of(&self, name: &str) -> Option<RunState> {
        self.services.lock().get(name).map(|s| s.state)
    }

    pub fn target_log(&self) -> RecordingTarget {
        self.target.lock().clone()
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn transition(&self, name: &str, from_ok: &[RunState], to: RunState) -> Result<()> {
        let mut services = self.services.lock();
        let service = services
            .get_mut(name)
            .ok_or_else(|| ServiceError::NotInstalled(name.to_string()))?;
        if !from_ok.contains(&service.state) {
            return Err(ServiceError::config("Invalid service state", 1062));
        }
        service.state = to;
        Ok(())
    }
}

/// Failure-actions target sharing its log with the owning [`FakeScm`]
pub(crate) struct SharedTarget(Arc<Mutex<RecordingTarget>>);

impl RecoveryTarget for SharedTarget {
    fn acquire_shutdown_privilege(&mut self) -> Result<()> {
        self.0.lock().acquire_shutdown_privilege()
    }

    fn submit_failure_actions(&mut self, record: &mut FailureActionsRecord) -> Result<()> {
        self.0.lock().submit_failure_actions(record)
    }
}

impl ServiceRegistry for FakeScm {
    type Target = SharedTarget;

    fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.services.lock().contains_key(name))
    }

    fn register(&mut self, record: &RegistrationRecord) -> Result<SharedTarget> {
        self.services.lock().insert(
            record.name.clone(),
            FakeService {
                record: Some(record.clone()),
                state: RunState::Stopped,
            },
        );
        self.target.lock().fail_submit = self.fail_submit;
        Ok(SharedTarget(self.target.clone()))
    }

    fn unregister(&mut self, name: &str) -> Result<()> {
        self.log.lock().push(format!("delete {}", name));
        self.services
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotInstalled(name.to_string()))
    }
}

impl ServiceControl for FakeScm {
    fn query_state(&self, name: &str) -> Result<RunState> {
        let mut services = self.services.lock();
        let service = services
            .get_mut(name)
            .ok_or_else(|| ServiceError::NotInstalled(name.to_string()))?;
        let current = service.state;
        if !self.stuck {
            service.state = match current {
                RunState::StartPending => RunState::Running,
                RunState::StopPending => RunState::Stopped,
                other => other,
            };
        }
        Ok(current)
    }

    fn request_start(&self, name: &str) -> Result<()> {
        self.log.lock().push(format!("start {}", name));
        self.transition(name, &[RunState::Stopped], RunState::StartPending)
    }

    fn request_stop(&self, name: &str) -> Result<()> {
        self.log.lock().push(format!("stop {}", name));
        self.transition(
            name,
            &[RunState::Running, RunState::Paused],
            RunState::StopPending,
        )
    }
}

/// Elevation stub counting relaunch attempts
pub(crate) struct FakeElevation {
    elevated: bool,
    can_relaunch: bool,
    relaunches: AtomicUsize,
}

impl FakeElevation {
    pub fn admin() -> Self {
        Self {
            elevated: true,
            can_relaunch: false,
            relaunches: AtomicUsize::new(0),
        }
    }

    pub fn user(can_relaunch: bool) -> Self {
        Self {
            elevated: false,
            can_relaunch,
            relaunches: AtomicUsize::new(0),
        }
    }

    pub fn relaunches(&self) -> usize {
        self.relaunches.load(Ordering::SeqCst)
    }
}

impl Elevation for FakeElevation {
    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn relaunch_elevated(&self) -> Result<bool> {
        self.relaunches.fetch_add(1, Ordering::SeqCst);
        Ok(self.can_relaunch)
    }
}
