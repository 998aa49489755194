//! One-way cooperative cancellation signal
//!
//! The signal is a zero-capacity channel whose only sender is dropped on
//! cancel. Every receiver then sees a disconnect, which wakes blocked
//! `recv_timeout` calls immediately.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Raised by [`CancellationToken::check`] once cancellation was requested
///
/// Work functions propagate it with `?`; the controller treats it as a
/// normal exit, not as a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Owner side of the signal
#[derive(Debug)]
pub struct CancellationSource {
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl CancellationSource {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: rx,
        }
    }

    /// Hand out a token observing this source
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            receiver: self.receiver.clone(),
        }
    }

    /// Raise the signal. Idempotent.
    pub fn cancel(&self) {
        self.sender.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side handed to the work function
#[derive(Debug, Clone)]
pub struct CancellationToken {
    receiver: Receiver<()>,
}

impl CancellationToken {
    /// Block for up to `timeout`, returning early once cancelled
    ///
    /// Returns `true` if cancellation was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
            // Nothing is ever sent on the channel
            Ok(()) => self.is_cancelled(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Wait for `timeout`, then fail with [`Cancelled`] if cancelled meanwhile
    pub fn sleep(&self, timeout: Duration) -> Result<(), Cancelled> {
        if self.wait(timeout) {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out() {
        let source = CancellationSource::new();
        let token = source.token();

        let start = Instant::now();
        assert!(!token.wait(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_wakes_waiter() {
        let source = CancellationSource::new();
        let token = source.token();

        let waiter = thread::spawn(move || {
            let start = Instant::now();
            let cancelled = token.wait(Duration::from_secs(10));
            (cancelled, start.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        source.cancel();

        let (cancelled, elapsed) = waiter.join().unwrap();
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(2), "waited {:?}", elapsed);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let source = CancellationSource::new();
        let token = source.token();
        source.cancel();
        source.cancel();

        assert!(source.is_cancelled());
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled));
        assert_eq!(token.sleep(Duration::from_secs(10)), Err(Cancelled));
    }

    #[test]
    fn test_cancelled_converts_to_anyhow() {
        let source = CancellationSource::new();
        let token = source.token();
        source.cancel();

        let work = || -> anyhow::Result<()> {
            token.check()?;
            Ok(())
        };
        assert!(work().unwrap_err().is::<Cancelled>());
    }
}
