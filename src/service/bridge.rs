//! Adapts the lifecycle controller to supervisor notifications

use crate::error::Result;
use crate::lifecycle::LifecycleController;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the bridge checks whether the worker exited on its own
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Notifications delivered by the supervisor (or the console)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Stop requested
    Stop,
    /// Host is powering down
    Shutdown,
    /// Supervisor asks for the current status
    Interrogate,
}

/// Status the bridge reports back to the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedState {
    StartPending,
    Running,
    StopPending,
    Stopped { exit_code: u32 },
}

/// Receives status updates from the bridge
pub trait StatusReporter {
    fn report(&mut self, state: ReportedState) -> Result<()>;
}

/// Drives one controller through a supervised run
pub struct SupervisorBridge {
    controller: Arc<LifecycleController>,
}

impl SupervisorBridge {
    pub fn new(controller: Arc<LifecycleController>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<LifecycleController> {
        &self.controller
    }

    /// Start notification: spawn the worker and return
    pub fn on_start(&self) -> Result<()> {
        self.controller.start()
    }

    /// Stop notification: blocks until the worker exits
    pub fn on_stop(&self) -> Result<()> {
        self.controller.stop()
    }

    /// Shutdown notification, handled like stop
    pub fn on_shutdown(&self) -> Result<()> {
        self.on_stop()
    }

    /// Start the worker, wait for a stop or shutdown event, then stop it
    ///
    /// The run also ends when the worker returns by itself or when the
    /// event source goes away.
    pub fn run<R>(&self, events: &Receiver<SupervisorEvent>, reporter: &mut R) -> Result<()>
    where
        R: StatusReporter + ?Sized,
    {
        reporter.report(ReportedState::StartPending)?;

        if let Err(e) = self.on_start() {
            reporter.report(ReportedState::Stopped { exit_code: 1 })?;
            return Err(e);
        }
        reporter.report(ReportedState::Running)?;

        let trigger = loop {
            match events.recv_timeout(WORKER_POLL_INTERVAL) {
                Ok(SupervisorEvent::Interrogate) => {
                    debug!("Interrogate received");
                }
                Ok(event) => break event,
                Err(RecvTimeoutError::Timeout) => {
                    if self.controller.is_finished() {
                        warn!(
                            "Service '{}' work function exited on its own",
                            self.controller.name()
                        );
                        break SupervisorEvent::Stop;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Event source closed");
                    break SupervisorEvent::Stop;
                }
            }
        };

        info!("Received {:?} for '{}'", trigger, self.controller.name());
        reporter.report(ReportedState::StopPending)?;

        let stopped = match trigger {
            SupervisorEvent::Shutdown => self.on_shutdown(),
            _ => self.on_stop(),
        };
        let exit_code = if stopped.is_ok() { 0 } else { 1 };
        reporter.report(ReportedState::Stopped { exit_code })?;
        stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{CancellationToken, ControllerState};
    use crossbeam_channel::bounded;
    use std::thread;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingReporter {
        states: Vec<ReportedState>,
    }

    impl StatusReporter for RecordingReporter {
        fn report(&mut self, state: ReportedState) -> Result<()> {
            self.states.push(state);
            Ok(())
        }
    }

    fn looping_controller() -> Arc<LifecycleController> {
        Arc::new(LifecycleController::new(
            "bridge",
            |token: &CancellationToken| loop {
                token.sleep(Duration::from_millis(20))?;
            },
        ))
    }

    #[test]
    fn test_start_and_stop_notifications() {
        let bridge = SupervisorBridge::new(looping_controller());
        bridge.on_start().unwrap();
        assert_eq!(bridge.controller().state(), ControllerState::Running);

        bridge.on_shutdown().unwrap();
        assert_eq!(bridge.controller().state(), ControllerState::Stopped);
        bridge.on_stop().unwrap();
    }

    #[test]
    fn test_run_until_stop_event() {
        let bridge = SupervisorBridge::new(looping_controller());
        let (tx, rx) = bounded(4);

        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            tx.send(SupervisorEvent::Interrogate).unwrap();
            tx.send(SupervisorEvent::Stop).unwrap();
        });

        let mut reporter = RecordingReporter::default();
        bridge.run(&rx, &mut reporter).unwrap();
        sender.join().unwrap();

        assert_eq!(
            reporter.states,
            vec![
                ReportedState::StartPending,
                ReportedState::Running,
                ReportedState::StopPending,
                ReportedState::Stopped { exit_code: 0 },
            ]
        );
        assert_eq!(bridge.controller().state(), ControllerState::Stopped);
    }

    #[test]
    fn test_run_ends_when_worker_returns() {
        let controller = Arc::new(LifecycleController::new(
            "short",
            |_token: &CancellationToken| Ok(()),
        ));
        let bridge = SupervisorBridge::new(controller);
        let (_tx, rx) = bounded::<SupervisorEvent>(1);

        let start = Instant::now();
        let mut reporter = RecordingReporter::default();
        bridge.run(&rx, &mut reporter).unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(
            reporter.states.last(),
            Some(&ReportedState::Stopped { exit_code: 0 })
        );
    }

    #[test]
    fn test_run_reports_failed_start() {
        let controller = looping_controller();
        controller.stop().unwrap();
        let bridge = SupervisorBridge::new(controller);
        let (_tx, rx) = bounded::<SupervisorEvent>(1);

        let mut reporter = RecordingReporter::default();
        assert!(bridge.run(&rx, &mut reporter).is_err());
        assert_eq!(
            reporter.states,
            vec![
                ReportedState::StartPending,
                ReportedState::Stopped { exit_code: 1 },
            ]
        );
    }
}
