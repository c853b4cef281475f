//! # Lifecycle events emitted by the supervisor side of a pea.
//!
//! The [`EventKind`] enum classifies what the supervisor did or observed; the
//! [`Event`] struct carries the pea name, a reason and the control address involved.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use peapod::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CancelSent)
//!     .with_pea("encoder")
//!     .with_addr("tcp://0.0.0.0:50000");
//!
//! assert_eq!(ev.kind, EventKind::CancelSent);
//! assert_eq!(ev.pea.as_deref(), Some("encoder"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of pea events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The execution context was launched.
    ///
    /// Sets: `pea`, `reason` (execution model)
    Starting,

    /// Readiness was confirmed by `wait_start_success`.
    ///
    /// Sets: `pea`
    Ready,

    /// The body shut down before ever becoming ready.
    ///
    /// Sets: `pea`
    StartFailed,

    /// Readiness was not signalled within the ready timeout.
    ///
    /// Sets: `pea`, `timeout_ms`
    ReadyTimeout,

    /// A deactivate signal was delivered.
    ///
    /// Sets: `pea`, `addr`
    DeactivateSent,

    /// A cancel signal was delivered.
    ///
    /// Sets: `pea`, `addr`
    CancelSent,

    /// Sending a control signal failed (logged, not raised).
    ///
    /// Sets: `pea`, `addr`, `reason`
    SignalFailed,

    /// The context was forcibly terminated.
    ///
    /// Sets: `pea`
    Terminated,

    /// `close()` finished.
    ///
    /// Sets: `pea`
    Stopped,
}

/// Pea event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the pea.
    pub pea: Option<Arc<str>>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Control address a signal was sent to.
    pub addr: Option<Arc<str>>,
    /// Ready timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pea: None,
            reason: None,
            addr: None,
            timeout_ms: None,
        }
    }

    /// Attaches the pea name.
    #[inline]
    pub fn with_pea(mut self, pea: impl Into<Arc<str>>) -> Self {
        self.pea = Some(pea.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a control address.
    #[inline]
    pub fn with_addr(mut self, addr: impl Into<Arc<str>>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }
}
