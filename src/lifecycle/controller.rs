//! Runs service work on a dedicated worker thread

use crate::error::{Result, ServiceError};
use crate::lifecycle::{CancellationSource, CancellationToken, Cancelled};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error, info, warn};

/// Work function run by the controller
///
/// Expected to loop until the token is cancelled, waiting on the token
/// instead of sleeping. Returning `Err(Cancelled)` is a normal exit.
pub type WorkFn = Box<dyn FnOnce(&CancellationToken) -> anyhow::Result<()> + Send + 'static>;

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Created, worker not spawned yet
    Idle,
    /// Worker spawned
    Running,
    /// Cancellation raised, waiting for the worker
    StopRequested,
    /// Worker joined (or never started)
    Stopped,
}

/// Owns one worker thread and the signal used to stop it
///
/// All methods take `&self` so the controller can be shared between the
/// thread that starts it and the thread that delivers the stop request.
pub struct LifecycleController {
    name: String,
    state: Mutex<ControllerState>,
    work: Mutex<Option<WorkFn>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: Mutex<Option<ThreadId>>,
    stopped: Condvar,
    cancel: CancellationSource,
}

impl LifecycleController {
    /// Create a controller for the given work function
    pub fn new<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(&CancellationToken) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            state: Mutex::new(ControllerState::Idle),
            work: Mutex::new(Some(Box::new(work))),
            worker: Mutex::new(None),
            worker_id: Mutex::new(None),
            stopped: Condvar::new(),
            cancel: CancellationSource::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock()
    }

    /// Whether the worker has returned (joined or not)
    pub fn is_finished(&self) -> bool {
        let state = self.state();
        match self.worker.lock().as_ref() {
            Some(handle) => handle.is_finished(),
            None => state != ControllerState::Running,
        }
    }

    /// Spawn the worker and return immediately
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state != ControllerState::Idle {
            return Err(ServiceError::AlreadyStarted);
        }

        let work = self.work.lock().take().ok_or(ServiceError::AlreadyStarted)?;
        let token = self.cancel.token();
        let name = self.name.clone();

        let spawned = thread::Builder::new()
            .name(format!("{}-worker", self.name))
            .spawn(move || run_work(&name, work, &token));

        match spawned {
            Ok(handle) => {
                *self.worker_id.lock() = Some(handle.thread().id());
                *self.worker.lock() = Some(handle);
                *state = ControllerState::Running;
                info!("Service '{}' worker started", self.name);
                Ok(())
            }
            Err(e) => {
                *state = ControllerState::Stopped;
                error!("Failed to spawn worker for '{}': {}", self.name, e);
                Err(e.into())
            }
        }
    }

    /// Raise cancellation and block until the worker has exited
    ///
    /// Stopping an idle or already stopped controller is a no-op. A stop
    /// racing another one waits for the same join. Must not be called from
    /// the worker thread.
    pub fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                ControllerState::Idle => {
                    self.cancel.cancel();
                    self.work.lock().take();
                    *state = ControllerState::Stopped;
                    debug!("Service '{}' stopped before start", self.name);
                    return Ok(());
                }
                ControllerState::Stopped => return Ok(()),
                ControllerState::Running | ControllerState::StopRequested => {}
            }

            if *self.worker_id.lock() == Some(thread::current().id()) {
                return Err(ServiceError::StopFromWorker);
            }

            if *state == ControllerState::StopRequested {
                debug!("Service '{}' stop already in progress, waiting", self.name);
                self.stopped.wait_while(&mut state, |s| *s != ControllerState::Stopped);
                return Ok(());
            }

            *state = ControllerState::StopRequested;
        }

        info!("Stopping service '{}'...", self.name);
        self.cancel.cancel();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Service '{}' worker panicked", self.name);
            }
        }

        *self.state.lock() = ControllerState::Stopped;
        self.stopped.notify_all();
        info!("Service '{}' stopped", self.name);
        Ok(())
    }
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if self.state() == ControllerState::Running {
            if let Err(e) = self.stop() {
                warn!("Service '{}' not stopped on drop: {}", self.name, e);
            }
        }
    }
}

fn run_work(name: &str, work: WorkFn, token: &CancellationToken) {
    match work(token) {
        Ok(()) => info!("Service '{}' work function returned", name),
        Err(e) if e.is::<Cancelled>() => debug!("Service '{}' work function cancelled", name),
        Err(e) => error!("Service '{}' work function failed: {:#}", name, e),
    }
}
