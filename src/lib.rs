//! # peapod
//!
//! **Peapod** supervises a single pipeline unit (a *pea*): it runs a pluggable
//! [`Runtime`] either in a forked OS process or as a cooperative tokio task,
//! waits for it to become ready, and stops it through its control plane.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                     ┌──────────────┐
//!                     │  PeaConfig   │
//!                     └──────┬───────┘
//!                            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Pea (supervisor)                                                 │
//! │  - select()          (which RuntimeFactory, remote-controlled?)   │
//! │  - control::resolve  (local / remote control addresses)           │
//! │  - DualEvent         (ready + shutdown, one shared word)          │
//! │  - Bus               (broadcast lifecycle events)                 │
//! └──────┬─────────────────────────────────────────────────┬──────────┘
//!        │ start(body)                                     │ cancel / deactivate
//!        ▼                                                 │ (control plane)
//! ┌───────────────────────────────┐                        │
//! │ ExecutionContext              │                        │
//! │  Isolated: fork() + runtime   │                        │
//! │  Cooperative: tokio::spawn    │                        │
//! └──────┬────────────────────────┘                        │
//!        ▼                                                 ▼
//!   lifecycle body:  create ─► setup ─► set(Ready) ─► run_forever ─► teardown
//!                                                                   │
//!                                          finish(): Shutdown set, Ready cleared
//! ```
//!
//! ### States
//! ```text
//! Created ─► Starting ─► Ready ─► Running ─► Stopping ─► Stopped
//!               │                    │
//!               └──────► Failed ◄────┘
//! ```
//!
//! ## Features
//! | Area               | Description                                             | Key types                                   |
//! |--------------------|---------------------------------------------------------|---------------------------------------------|
//! | **Supervision**    | Start, readiness wait, graceful close, forced stop.     | [`Pea`], [`PeaState`]                       |
//! | **Runtimes**       | Pluggable units and their registry/selection.           | [`Runtime`], [`RuntimeFactory`], [`RuntimeRegistry`] |
//! | **Contexts**       | Process isolation or cooperative tasks.                 | [`ExecutionContext`], [`ExecutionModel`]    |
//! | **Signaling**      | Ready/shutdown flags across the execution boundary.     | [`DualEvent`], [`Flag`]                     |
//! | **Control plane**  | Where a runtime accepts cancel/deactivate.              | [`ControlAddress`], [`ControlAddresses`]    |
//! | **Events**         | Lifecycle events for observers.                         | [`Event`], [`EventKind`], [`Bus`]           |
//! | **Errors**         | Typed errors for supervision and runtimes.              | [`PeaError`], [`RuntimeError`]              |
//!
//! ## Optional features
//! - `test-utils`: a scripted runtime and a line-based control channel.
//!
//! ## Example
//! ```rust
//! use peapod::testing::{Script, ScriptedFactory};
//! use peapod::{ExecutionModel, LOCAL_RUNTIME, Pea, PeaConfig, PeaState, RuntimeRegistry};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = RuntimeRegistry::new();
//!     registry.register(ScriptedFactory::new(LOCAL_RUNTIME, Script::default()));
//!
//!     let cfg = PeaConfig {
//!         ctrl_with_ipc: true,
//!         ..PeaConfig::default()
//!             .with_name("encoder")
//!             .with_execution(ExecutionModel::Cooperative)
//!     };
//!     let pea = Pea::new(cfg, &registry)?;
//!
//!     pea.start().await?;
//!     assert_eq!(pea.state(), PeaState::Running);
//!
//!     pea.close().await;
//!     assert_eq!(pea.state(), PeaState::Stopped);
//!     Ok(())
//! }
//! ```
mod config;
mod context;
mod control;
mod core;
mod error;
mod events;
mod logging;
mod readiness;
mod runtimes;

#[cfg(feature = "test-utils")]
pub mod testing;

// ---- Public re-exports ----

pub use config::{DEFAULT_HOST, DEFAULT_PEA_NAME, ExecutionModel, PeaConfig, PeaRole, SocketType};
pub use context::{Body, CooperativeContext, ExecutionContext, IsolatedContext};
pub use control::{ControlAddress, ControlAddresses, resolve as resolve_control_addresses};
pub use self::core::{
    ENV_LOG_CONFIG, ENV_LOG_ID, ENV_PEA_NAME, Pea, PeaState, wait_for_shutdown_signal,
};
pub use error::{PeaError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use logging::{DEFAULT_DIRECTIVE, QUIET_DIRECTIVE, init_logging};
pub use readiness::{DualEvent, Flag, Signals};
pub use runtimes::{
    CONTAINER_RUNTIME, CONTAINER_SCHEME, LOCAL_RUNTIME, REMOTE_RUNTIME, Runtime, RuntimeFactory,
    RuntimeRef, RuntimeRegistry, Selection, resolve_name, select,
};
