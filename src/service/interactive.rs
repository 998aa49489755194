//! Foreground console run

use crate::error::Result;
use crate::lifecycle::LifecycleController;
use crate::service::{ReportedState, StatusReporter, SupervisorBridge, SupervisorEvent};
use crossbeam_channel::bounded;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use tracing::warn;

/// Run the controller until Enter or Ctrl+C is pressed
pub fn run_interactive(controller: Arc<LifecycleController>) -> Result<()> {
    let (tx, rx) = bounded::<SupervisorEvent>(4);

    let ctrlc_tx = tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = ctrlc_tx.try_send(SupervisorEvent::Stop);
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    // Never joined: it stays blocked on stdin when Ctrl+C ends the run
    thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
            let _ = tx.send(SupervisorEvent::Stop);
        })?;

    let mut reporter = ConsoleReporter::new(controller.name(), std::io::stdout());
    SupervisorBridge::new(controller).run(&rx, &mut reporter)
}

/// Prints running/stopped status lines
pub struct ConsoleReporter<W: Write> {
    name: String,
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(name: impl Into<String>, out: W) -> Self {
        Self {
            name: name.into(),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StatusReporter for ConsoleReporter<W> {
    fn report(&mut self, state: ReportedState) -> Result<()> {
        match state {
            ReportedState::Running => writeln!(
                self.out,
                "Service '{}' is running. Press ENTER to stop...",
                self.name
            )?,
            ReportedState::StopPending => writeln!(self.out, "Stopping...")?,
            ReportedState::Stopped { exit_code: 0 } => {
                writeln!(self.out, "Service '{}' stopped.", self.name)?
            }
            ReportedState::Stopped { exit_code } => writeln!(
                self.out,
                "Service '{}' stopped with exit code {}.",
                self.name, exit_code
            )?,
            ReportedState::StartPending => {}
        }
        self.out.flush()?;
        Ok(())
    }
}
