//! Isolated context: the body runs in a forked child process.
//!
//! ## Child side
//! ```text
//! fork() ─► [daemon] PR_SET_PDEATHSIG(SIGKILL)
//!        ─► new OS thread ─► current-thread tokio runtime ─► block_on(body)
//!        ─► _exit(code)
//! ```
//! The body runs on a fresh thread because the forking thread may carry the
//! parent's runtime context in its thread-locals. `_exit` skips the parent's
//! destructors and atexit handlers, which belong to the supervisor.
//!
//! ## Parent side
//! `join` polls `waitpid(WNOHANG)`; `terminate` sends `SIGKILL` and reaps.
//!
//! ## Precondition
//! After `fork()` only the forking thread exists in the child, and any lock another
//! thread held at that moment stays held forever. `start` therefore refuses to fork
//! from a multi-thread tokio runtime. The host must also not run other threads that
//! may hold stdio, allocator or logging locks while a pea starts.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::Instant;

use crate::error::PeaError;

use super::Body;

/// Poll interval while joining a child.
const POLL: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug)]
enum Child {
    Idle,
    Running(Pid),
    Exited,
}

/// Runs the body in a forked OS process.
pub struct IsolatedContext {
    daemon: bool,
    child: Mutex<Child>,
}

impl IsolatedContext {
    /// Creates an idle context.
    pub fn new(daemon: bool) -> Self {
        Self {
            daemon,
            child: Mutex::new(Child::Idle),
        }
    }

    /// Returns the child pid while it is running.
    pub fn pid(&self) -> Option<i32> {
        match *self.lock() {
            Child::Running(pid) => Some(pid.as_raw()),
            Child::Idle | Child::Exited => None,
        }
    }

    pub(super) fn start(&self, body: Body) -> Result<(), PeaError> {
        let mut child = self.lock();
        if !matches!(*child, Child::Idle) {
            return Err(PeaError::Context {
                reason: "isolated context already started".into(),
            });
        }
        ensure_single_runtime_thread()?;

        // SAFETY: no runtime worker thread exists besides the caller (checked above).
        // The child only spawns a fresh thread, builds its own runtime and leaves
        // through `_exit`; it never returns into the parent's stack.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => run_child(body, self.daemon),
            Ok(ForkResult::Parent { child: pid }) => {
                tracing::debug!(pid = pid.as_raw(), "forked isolated context");
                *child = Child::Running(pid);
                Ok(())
            }
            Err(err) => Err(PeaError::Context {
                reason: format!("fork: {err}"),
            }),
        }
    }

    pub(super) async fn join(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.try_reap() {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            tokio::time::sleep(POLL).await;
        }
    }

    pub(super) fn terminate(&self) -> bool {
        let mut child = self.lock();
        let Child::Running(pid) = *child else {
            return false;
        };
        match kill(pid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(err) => tracing::warn!(pid = pid.as_raw(), error = %err, "failed to kill isolated context"),
        }
        // SIGKILL cannot be caught, so this returns promptly.
        if let Err(err) = waitpid(pid, None) {
            if err != Errno::ECHILD {
                tracing::warn!(pid = pid.as_raw(), error = %err, "failed to reap isolated context");
            }
        }
        tracing::debug!(pid = pid.as_raw(), "isolated context terminated");
        *child = Child::Exited;
        true
    }

    pub(super) fn is_alive(&self) -> bool {
        !self.try_reap()
    }

    /// Returns `true` once the child is gone (or never existed).
    fn try_reap(&self) -> bool {
        let mut child = self.lock();
        let Child::Running(pid) = *child else {
            return true;
        };
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => false,
            Ok(status) => {
                tracing::debug!(pid = pid.as_raw(), ?status, "isolated context exited");
                *child = Child::Exited;
                true
            }
            Err(err) => {
                if err != Errno::ECHILD {
                    tracing::warn!(pid = pid.as_raw(), error = %err, "waitpid failed");
                }
                *child = Child::Exited;
                true
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for IsolatedContext {
    fn drop(&mut self) {
        if self.terminate() {
            tracing::debug!("isolated context dropped while running");
        }
    }
}

/// Rejects forking from a runtime whose other worker threads may hold locks.
fn ensure_single_runtime_thread() -> Result<(), PeaError> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() != RuntimeFlavor::CurrentThread => {
            Err(PeaError::Context {
                reason: format!(
                    "isolated execution needs a current-thread tokio runtime, found {:?}",
                    handle.runtime_flavor()
                ),
            })
        }
        _ => Ok(()),
    }
}

fn run_child(body: Body, daemon: bool) -> ! {
    #[cfg(target_os = "linux")]
    if daemon {
        // SAFETY: plain prctl with integer arguments.
        unsafe {
            libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL);
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = daemon;

    let worker = std::thread::Builder::new()
        .name("pea-body".into())
        .spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => {
                    rt.block_on(body);
                    0
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to build runtime in isolated context");
                    1
                }
            }
        });
    let code = match worker {
        Ok(handle) => handle.join().unwrap_or(1),
        Err(_) => 1,
    };

    // SAFETY: terminates the child without running the parent's exit handlers.
    unsafe { libc::_exit(code) }
}
