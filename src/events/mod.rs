//! Supervisor events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by a [`Pea`](crate::Pea).
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publisher**: the supervisor side of a `Pea` (`start`, `wait_start_success`, `close`).
//! - **Consumers**: anything holding a receiver from `Pea::subscribe()`.
//!
//! The lifecycle body may run in another process, so transitions that happen
//! inside it are reported when the supervisor observes them, not when they occur.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
