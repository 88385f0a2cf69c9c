//! # KillableThread
//!
//! A KillableThread is a thread with a built-in interruption mechanism/flag.

use std::thread::{self, JoinHandle};

use cb::channel::{self, Receiver, Sender, TryRecvError};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Handed to the thread body. Becomes set once the owning `KillableThread` is killed or dropped.
#[derive(Debug, Clone)]
pub struct KillSignal {
    rx: Receiver<()>,
}
impl KillSignal {
    /// Nothing is ever sent on the channel, so anything but `Empty` means the owner let go.
    pub fn should_stop(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }
}

/// Alias for the return of `finish` in `KillableThread`.
pub type FinishResult<T> = Option<thread::Result<T>>;

/// A `KillableThread`. Effectively a `JoinHandle` to the thread started by when creating
/// `KillableThread`.
pub struct KillableThread<T: Send + 'static> {
    kill_mechanism: Option<Sender<()>>,
    handle: Option<JoinHandle<T>>,
}
impl<T: Send + 'static> KillableThread<T> {
    /// Creates a `KillableThread`.
    ///
    /// # Arguments
    ///
    /// * `name` Name of the KillableThread. Used during debugging only.
    /// * `f` The function being run by the thread.
    ///
    /// # Remarks
    ///
    /// `f` must check the `KillSignal` itself. The thread is never interrupted from outside.
    pub fn new<F: FnOnce(KillSignal) -> T + Send + 'static>(name: String, f: F) -> Result<KillableThread<T>, std::io::Error> {
        let (tx, rx) = channel::bounded(0);
        let signal = KillSignal { rx };
        let h = thread::Builder::new().name(name).spawn(move || f(signal))?;
        Ok(KillableThread {
            kill_mechanism: Some(tx),
            handle: Some(h),
        })
    }

    /// Raises the kill signal. Does not wait for the thread.
    pub fn kill(&mut self) {
        drop(self.kill_mechanism.take());
    }

    pub fn is_killed(&self) -> bool {
        self.kill_mechanism.is_none()
    }

    /// True once the body has returned (or was already joined).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Joins the thread if it is done, without blocking.
    ///
    /// # Remarks
    ///
    /// Returns the result exactly once; None before the body returns and after it was taken.
    pub fn poll(&mut self) -> FinishResult<T> {
        if self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(false) {
            self.kill_mechanism.take();
            self.handle.take().map(|h| h.join())
        } else {
            None
        }
    }

    /// Effectively the same as `join` in a `JoinHandle`, but raises the kill signal first.
    pub fn finish(mut self) -> FinishResult<T> {
        drop(self.kill_mechanism.take());
        self.handle.take().map(|h| h.join())
    }
}
impl<T: Send + 'static> Drop for KillableThread<T> {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            drop(self.kill_mechanism.take());
            debug!(
                "Detaching thread {:?} after raising its kill signal.",
                h.thread().name().unwrap_or("<unnamed>")
            );
        }
    }
}
