//! # Runtime abstraction.
//!
//! A [`Runtime`] is the externally supplied unit of work a [`Pea`](crate::Pea) supervises.
//! Its [`RuntimeFactory`] plays the role of the implementation type: it builds
//! instances and sends control-plane signals to a running instance without
//! holding a reference to it.
//!
//! ## Contract
//! ```text
//! factory.create(cfg, ctrl_addr) ─► setup() ─► run_forever() ─► teardown()
//!                                                  ▲
//! factory.cancel(ctrl_addr) ───── control plane ───┘  → Err(RuntimeError::Terminated)
//! ```
//! - `run_forever()` must watch its control address and return
//!   [`RuntimeError::Terminated`] when it receives a cancel signal.
//! - `teardown()` is called after `run_forever()` and after a failed `setup()`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::PeaConfig;
use crate::control::ControlAddress;
use crate::error::RuntimeError;

/// One supervised unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use peapod::{Runtime, RuntimeError};
///
/// struct Idle;
///
/// #[async_trait]
/// impl Runtime for Idle {
///     async fn setup(&mut self) -> Result<(), RuntimeError> { Ok(()) }
///     async fn run_forever(&mut self) -> Result<(), RuntimeError> {
///         Err(RuntimeError::Terminated)
///     }
///     async fn teardown(&mut self) -> Result<(), RuntimeError> { Ok(()) }
/// }
/// ```
#[async_trait]
pub trait Runtime: Send + 'static {
    /// Acquires resources; a failure means the unit never becomes ready.
    async fn setup(&mut self) -> Result<(), RuntimeError>;

    /// Serves until cancelled through the control plane.
    async fn run_forever(&mut self) -> Result<(), RuntimeError>;

    /// Releases resources; failures are only logged.
    async fn teardown(&mut self) -> Result<(), RuntimeError>;
}

/// Builds runtimes and signals running ones.
#[async_trait]
pub trait RuntimeFactory: Send + Sync + 'static {
    /// Registered implementation name.
    fn name(&self) -> &str;

    /// Instantiates a runtime listening on `ctrl_addr`.
    fn create(
        &self,
        cfg: &PeaConfig,
        ctrl_addr: &ControlAddress,
    ) -> Result<Box<dyn Runtime>, RuntimeError>;

    /// Asks the runtime at `addr` to stop serving.
    async fn cancel(&self, addr: &ControlAddress, timeout: Duration) -> Result<(), RuntimeError>;

    /// Asks the runtime at `addr` to disconnect from its router before cancel.
    async fn deactivate(&self, addr: &ControlAddress, timeout: Duration)
    -> Result<(), RuntimeError>;
}

/// Shared handle to a factory.
pub type RuntimeRef = Arc<dyn RuntimeFactory>;
