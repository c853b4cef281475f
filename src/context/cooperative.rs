//! Cooperative context: the body is a task on the caller's tokio runtime.
//!
//! Completion is published on a `watch<bool>` by a guard owned by the task, so
//! any number of joiners can wait (each with its own timeout) without sharing a
//! lock or the `JoinHandle`. The guard fires on normal completion, on panic and
//! when the task is dropped by a shutting-down runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::error::PeaError;

use super::Body;

/// Marks the body finished when dropped.
struct Done(Arc<watch::Sender<bool>>);

impl Drop for Done {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

/// Runs the body with [`tokio::spawn`].
///
/// There is no safe way to stop a task that does not cooperate, so
/// [`terminate`](Self::terminate) does nothing; cancellation must go through the
/// runtime's control address.
pub struct CooperativeContext {
    started: AtomicBool,
    done: Arc<watch::Sender<bool>>,
}

impl Default for CooperativeContext {
    fn default() -> Self {
        let (done, _rx) = watch::channel(false);
        Self {
            started: AtomicBool::new(false),
            done: Arc::new(done),
        }
    }
}

impl CooperativeContext {
    /// Creates an idle context.
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn start(&self, body: Body) -> Result<(), PeaError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PeaError::Context {
                reason: "cooperative context already started".into(),
            });
        }
        let done = Done(Arc::clone(&self.done));
        // Detached: completion is observed through `done`, never through the handle.
        drop(tokio::spawn(async move {
            let _done = done;
            body.await;
        }));
        Ok(())
    }

    pub(super) async fn join(&self, timeout: Option<Duration>) -> bool {
        if !self.started.load(Ordering::SeqCst) {
            return true;
        }
        let mut rx = self.done.subscribe();
        let finished = async move { rx.wait_for(|done| *done).await.is_ok() };
        match timeout {
            Some(t) => tokio::time::timeout(t, finished).await.unwrap_or(false),
            None => finished.await,
        }
    }

    pub(super) fn terminate(&self) -> bool {
        tracing::debug!("cooperative context can not be terminated; waiting for cancel instead");
        false
    }

    pub(super) fn is_alive(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !*self.done.borrow()
    }
}
