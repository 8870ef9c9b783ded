use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::debug;

pub fn send_group_signal(pgid: Pid, signal: Signal) -> nix::Result<()> {
    let result = signal::killpg(pgid, signal);
    debug!(%pgid, ?signal, ?result, "kill process group");
    result
}

/// Kills a process group once a wall-clock deadline passes.
pub struct Watchdog {
    cancel: mpsc::Sender<()>,
    handle: JoinHandle<bool>,
}

impl Watchdog {
    pub fn spawn(pgid: Pid, timeout_ms: u64) -> Self {
        let (cancel, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
                Err(RecvTimeoutError::Timeout) => {
                    let _ = send_group_signal(pgid, Signal::SIGKILL);
                    true
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
            }
        });
        Self { cancel, handle }
    }

    /// Stops the watchdog and tells whether it has fired.
    ///
    /// Must be called while the watched process is still unreaped.
    pub fn stop(self) -> bool {
        let _ = self.cancel.send(());
        self.handle.join().unwrap_or(false)
    }
}
