//! Test utilities (feature `test-utils`).
//!
//! - [`ScriptedFactory`] / [`ScriptedRuntime`]: a runtime whose setup delay and
//!   failures are scripted, served over a real control channel;
//! - [`ControlServer`] / [`send_command`]: line-based control channel on TCP or a
//!   Unix socket.

mod control;
mod runtime;

pub use control::{CMD_CANCEL, CMD_DEACTIVATE, CMD_PING, ControlServer, send_command};
pub use runtime::{Script, ScriptedFactory, ScriptedRuntime, Sent, SentLog};
