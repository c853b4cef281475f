//! # Pea state machine.
//!
//! ```text
//! Created ─► Starting ─► Ready ─► Running ─► Stopping ─► Stopped
//!               │                    │
//!               └──────► Failed ◄────┘
//! ```
//!
//! The state is derived, not stored: the supervisor keeps its own [`Phase`] and the
//! body reports through the [`Signals`] bits, which may live in another process.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::readiness::Signals;

/// Observable lifecycle state of a pea.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeaState {
    /// Constructed, not started.
    Created,
    /// Context launched, runtime not ready yet.
    Starting,
    /// Runtime signalled readiness; not yet confirmed by `wait_start_success`.
    Ready,
    /// Readiness confirmed; runtime serving.
    Running,
    /// `close()` in progress.
    Stopping,
    /// Finished cleanly.
    Stopped,
    /// Never became ready, or serving ended with a failure.
    Failed,
}

/// Supervisor-side progress.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Created = 0,
    Started = 1,
    Confirmed = 2,
    Closing = 3,
    Closed = 4,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Phase::Created,
            1 => Phase::Started,
            2 => Phase::Confirmed,
            3 => Phase::Closing,
            _ => Phase::Closed,
        }
    }
}

/// Latched once the body was launched; survives later phase changes.
const LAUNCHED: u8 = 0x80;
const PHASE_MASK: u8 = !LAUNCHED;

/// Atomic cell for [`Phase`], plus a latched "launched" bit.
#[derive(Debug)]
pub(crate) struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(Phase::Created as u8))
    }

    pub fn get(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::SeqCst) & PHASE_MASK)
    }

    /// Whether `Created → Started` ever happened.
    pub fn launched(&self) -> bool {
        self.0.load(Ordering::SeqCst) & LAUNCHED != 0
    }

    pub fn set(&self, phase: Phase) {
        let _ = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some((v & LAUNCHED) | phase as u8)
            });
    }

    /// Moves `from → to`; returns `false` if the phase was not `from`.
    ///
    /// Leaving `Created` this way latches the launched bit.
    pub fn advance(&self, from: Phase, to: Phase) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                if v & PHASE_MASK != from as u8 {
                    return None;
                }
                let launched = if from == Phase::Created { LAUNCHED } else { v & LAUNCHED };
                Some(launched | to as u8)
            })
            .is_ok()
    }
}

/// Combines supervisor phase and body signals into a [`PeaState`].
///
/// `launched` tells a pea closed before it ever started (nothing ran, so it
/// stopped cleanly) from one whose runtime outlived `close()` (failed).
pub(crate) fn derive(phase: Phase, launched: bool, s: Signals) -> PeaState {
    match phase {
        Phase::Created => PeaState::Created,
        _ if s.shutdown => {
            if s.served && !s.faulted {
                PeaState::Stopped
            } else {
                PeaState::Failed
            }
        }
        Phase::Closing => PeaState::Stopping,
        Phase::Closed => {
            if launched {
                PeaState::Failed
            } else {
                PeaState::Stopped
            }
        }
        Phase::Confirmed if s.ready => PeaState::Running,
        Phase::Started if s.ready => PeaState::Ready,
        Phase::Started | Phase::Confirmed => PeaState::Starting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(ready: bool, shutdown: bool, served: bool, faulted: bool) -> Signals {
        Signals {
            ready,
            shutdown,
            served,
            faulted,
        }
    }

    #[test]
    fn happy_path() {
        let none = Signals::default();
        assert_eq!(derive(Phase::Created, false, none), PeaState::Created);
        assert_eq!(derive(Phase::Started, true, none), PeaState::Starting);
        assert_eq!(derive(Phase::Started, true, sig(true, false, true, false)), PeaState::Ready);
        assert_eq!(derive(Phase::Confirmed, true, sig(true, false, true, false)), PeaState::Running);
        assert_eq!(derive(Phase::Closing, true, sig(true, false, true, false)), PeaState::Stopping);
        assert_eq!(derive(Phase::Closed, true, sig(false, true, true, false)), PeaState::Stopped);
    }

    #[test]
    fn failures() {
        // setup failed: shutdown without ever serving
        assert_eq!(derive(Phase::Started, true, sig(false, true, false, true)), PeaState::Failed);
        // serving ended with an error
        assert_eq!(derive(Phase::Confirmed, true, sig(false, true, true, true)), PeaState::Failed);
        // killed after a ready timeout
        assert_eq!(derive(Phase::Closed, true, sig(false, true, false, true)), PeaState::Failed);
    }

    #[test]
    fn closed_while_runtime_still_serving_is_failed() {
        let serving = sig(true, false, true, false);
        assert_eq!(derive(Phase::Closed, true, serving), PeaState::Failed);
        assert_eq!(derive(Phase::Closed, true, Signals::default()), PeaState::Failed);
    }

    #[test]
    fn closed_before_start_is_stopped() {
        assert_eq!(derive(Phase::Closed, false, Signals::default()), PeaState::Stopped);
    }

    #[test]
    fn phase_advance_is_exclusive() {
        let cell = PhaseCell::new();
        assert!(!cell.launched());
        assert!(cell.advance(Phase::Created, Phase::Started));
        assert!(!cell.advance(Phase::Created, Phase::Started));
        assert_eq!(cell.get(), Phase::Started);
        assert!(cell.launched());
        cell.set(Phase::Closed);
        assert_eq!(cell.get(), Phase::Closed);
        assert!(cell.launched());
    }

    #[test]
    fn set_without_start_keeps_launched_clear() {
        let cell = PhaseCell::new();
        cell.set(Phase::Closing);
        cell.set(Phase::Closed);
        assert_eq!(cell.get(), Phase::Closed);
        assert!(!cell.launched());
    }
}
