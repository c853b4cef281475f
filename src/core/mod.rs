//! Pea core: supervision and lifecycle.
//!
//! The only public API from this module is [`Pea`] and its [`PeaState`].
//!
//! Internal modules:
//! - [`pea`]: the supervisor; start, readiness wait, close, terminate;
//! - [`lifecycle`]: the body run inside the execution context;
//! - [`env`]: environment injection for isolated runtimes;
//! - [`state`]: phase tracking and the derived state machine;
//! - [`shutdown`]: OS signal handling inside an isolated context.

mod env;
mod lifecycle;
mod pea;
mod shutdown;
mod state;

pub use env::{ENV_LOG_CONFIG, ENV_LOG_ID, ENV_PEA_NAME};
pub use pea::Pea;
pub use shutdown::wait_for_shutdown_signal;
pub use state::PeaState;
