//! Starting and stopping an installed service with a bounded wait

use crate::error::{Result, ServiceError};
use crate::scm::{require_elevation, Elevation, ElevationCheck};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Interval between status queries while waiting for a state
const STATE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Current state of a registered service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    StartPending,
    StopPending,
    Running,
    ContinuePending,
    PausePending,
    Paused,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State queries and control requests against the supervisor
pub trait ServiceControl {
    fn query_state(&self, name: &str) -> Result<RunState>;

    /// Ask the supervisor to start the service, without waiting
    fn request_start(&self, name: &str) -> Result<()>;

    /// Ask the supervisor to stop the service, without waiting
    fn request_stop(&self, name: &str) -> Result<()>;
}

/// Result of a start or stop command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Started,
    AlreadyRunning,
    Stopped,
    AlreadyStopped,
    /// The command was handed to an elevated copy of this process
    Relaunched,
}

/// Poll until the service reaches `expected` or `timeout` elapses
pub fn wait_for_state<C>(
    control: &C,
    name: &str,
    expected: RunState,
    timeout: Duration,
    poll: Duration,
) -> Result<()>
where
    C: ServiceControl + ?Sized,
{
    let start = Instant::now();
    loop {
        let state = control.query_state(name)?;
        if state == expected {
            return Ok(());
        }

        let waited = start.elapsed();
        if waited >= timeout {
            return Err(ServiceError::Timeout {
                service: name.to_string(),
                expected: expected.to_string(),
                waited,
            });
        }

        debug!("Service '{}' is {}, waiting for {}", name, state, expected);
        thread::sleep(poll.min(timeout - waited));
    }
}

/// Start the service unless it is already running or starting
pub fn start_service<C, E>(
    control: &C,
    elevation: &E,
    name: &str,
    timeout: Duration,
) -> Result<ControlOutcome>
where
    C: ServiceControl + ?Sized,
    E: Elevation + ?Sized,
{
    match control.query_state(name)? {
        RunState::Running | RunState::StartPending => return Ok(ControlOutcome::AlreadyRunning),
        _ => {}
    }

    if require_elevation(elevation, "started")? == ElevationCheck::Relaunched {
        return Ok(ControlOutcome::Relaunched);
    }

    info!("Starting service '{}'", name);
    control.request_start(name)?;
    wait_for_state(control, name, RunState::Running, timeout, STATE_POLL_INTERVAL)?;
    Ok(ControlOutcome::Started)
}

/// Stop the service unless it is already stopped or stopping
pub fn stop_service<C, E>(
    control: &C,
    elevation: &E,
    name: &str,
    timeout: Duration,
) -> Result<ControlOutcome>
where
    C: ServiceControl + ?Sized,
    E: Elevation + ?Sized,
{
    match control.query_state(name)? {
        RunState::Stopped | RunState::StopPending => return Ok(ControlOutcome::AlreadyStopped),
        _ => {}
    }

    if require_elevation(elevation, "stopped")? == ElevationCheck::Relaunched {
        return Ok(ControlOutcome::Relaunched);
    }

    info!("Stopping service '{}'", name);
    control.request_stop(name)?;
    wait_for_state(control, name, RunState::Stopped, timeout, STATE_POLL_INTERVAL)?;
    Ok(ControlOutcome::Stopped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::testing::{FakeElevation, FakeScm};

    #[test]
    fn test_start_waits_for_running() {
        let scm = FakeScm::with_service("Mini", RunState::Stopped);
        let outcome =
            start_service(&scm, &FakeElevation::admin(), "Mini", Duration::from_secs(5)).unwrap();

        assert_eq!(outcome, ControlOutcome::Started);
        assert_eq!(scm.state_of("Mini"), Some(RunState::Running));
        assert_eq!(scm.requests(), vec!["start Mini"]);
    }

    #[test]
    fn test_start_is_noop_when_running_or_pending() {
        for state in [RunState::Running, RunState::StartPending] {
            let scm = FakeScm::with_service("Mini", state);
            let outcome =
                start_service(&scm, &FakeElevation::user(false), "Mini", Duration::from_secs(1))
                    .unwrap();
            assert_eq!(outcome, ControlOutcome::AlreadyRunning);
            assert!(scm.requests().is_empty());
        }
    }

    #[test]
    fn test_stop_requires_elevation() {
        let scm = FakeScm::with_service("Mini", RunState::Running);
        let err = stop_service(&scm, &FakeElevation::user(false), "Mini", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotElevated { operation: "stopped" }));
        assert!(scm.requests().is_empty());

        let elevation = FakeElevation::user(true);
        let outcome = stop_service(&scm, &elevation, "Mini", Duration::from_secs(1)).unwrap();
        assert_eq!(outcome, ControlOutcome::Relaunched);
        assert_eq!(elevation.relaunches(), 1);
    }

    #[test]
    fn test_stop_waits_for_stopped() {
        let scm = FakeScm::with_service("Mini", RunState::Running);
        let outcome =
            stop_service(&scm, &FakeElevation::admin(), "Mini", Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, ControlOutcome::Stopped);

        let outcome =
            stop_service(&scm, &FakeElevation::admin(), "Mini", Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, ControlOutcome::AlreadyStopped);
    }

    #[test]
    fn test_stuck_service_times_out() {
        let scm = FakeScm {
            stuck: true,
            ..FakeScm::with_service("Mini", RunState::Stopped)
        };

        let start = Instant::now();
        let err = wait_for_state(
            &scm,
            "Mini",
            RunState::Running,
            Duration::from_millis(100),
            Duration::from_millis(10),
        )
        .unwrap_err();

        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(matches!(err, ServiceError::Timeout { .. }));
        assert!(!err.is_configuration_error());
    }
}
