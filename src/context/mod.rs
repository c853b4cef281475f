//! # Execution contexts.
//!
//! [`ExecutionContext`] runs a lifecycle body either in a forked OS process or as a
//! task on the caller's tokio runtime, behind one `start`/`join`/`terminate` surface.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!   start(body) ───► │    ExecutionContext     │
//!   join(timeout) ─► │  ┌─────────┬──────────┐ │
//!   terminate() ───► │  │Isolated │Cooperative│ │
//!                    │  └────┬────┴────┬─────┘ │
//!                    └───────┼─────────┼───────┘
//!                            ▼         ▼
//!          fork() + fresh runtime   tokio::spawn
//!          SIGKILL on terminate     terminate is a no-op
//! ```
//!
//! ## Rules
//! - The variant is chosen once from [`ExecutionModel`]; call sites never branch on it.
//! - `join` returns `true` once the body has completed (or was never started).
//! - A cooperative body cannot be killed without corrupting shared state, so
//!   `terminate` only logs.

mod cooperative;
mod isolated;

use std::time::Duration;

use futures::future::BoxFuture;

pub use cooperative::CooperativeContext;
pub use isolated::IsolatedContext;

use crate::config::ExecutionModel;
use crate::error::PeaError;

/// Zero-argument lifecycle body.
pub type Body = BoxFuture<'static, ()>;

/// Isolated process or cooperative task.
pub enum ExecutionContext {
    Isolated(IsolatedContext),
    Cooperative(CooperativeContext),
}

impl ExecutionContext {
    /// Creates the context for `model`.
    ///
    /// `daemon` only matters for isolated contexts: the child is killed when the
    /// supervisor process dies (Linux).
    pub fn new(model: ExecutionModel, daemon: bool) -> Self {
        match model {
            ExecutionModel::Isolated => Self::Isolated(IsolatedContext::new(daemon)),
            ExecutionModel::Cooperative => Self::Cooperative(CooperativeContext::new()),
        }
    }

    /// Returns the execution model of this context.
    pub fn model(&self) -> ExecutionModel {
        match self {
            Self::Isolated(_) => ExecutionModel::Isolated,
            Self::Cooperative(_) => ExecutionModel::Cooperative,
        }
    }

    /// Launches `body` asynchronously.
    ///
    /// An isolated context must be started from a current-thread tokio runtime;
    /// otherwise this fails with [`PeaError::Context`].
    pub fn start(&self, body: Body) -> Result<(), PeaError> {
        match self {
            Self::Isolated(ctx) => ctx.start(body),
            Self::Cooperative(ctx) => ctx.start(body),
        }
    }

    /// Waits for the body to complete; `None` waits forever.
    ///
    /// Returns `false` if the timeout elapsed first.
    pub async fn join(&self, timeout: Option<Duration>) -> bool {
        match self {
            Self::Isolated(ctx) => ctx.join(timeout).await,
            Self::Cooperative(ctx) => ctx.join(timeout).await,
        }
    }

    /// Attempts a forced stop; returns `true` if a running body was killed.
    pub fn terminate(&self) -> bool {
        match self {
            Self::Isolated(ctx) => ctx.terminate(),
            Self::Cooperative(ctx) => ctx.terminate(),
        }
    }

    /// Whether the body was started and has not been observed to finish.
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Isolated(ctx) => ctx.is_alive(),
            Self::Cooperative(ctx) => ctx.is_alive(),
        }
    }
}
