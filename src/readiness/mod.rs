//! # Ready/shutdown signaling across the execution boundary.
//!
//! [`DualEvent`] holds the only state shared between a [`Pea`](crate::Pea) and its
//! lifecycle body: a `ready` flag and a `shutdown` flag, plus a combined wait.
//!
//! ## Architecture
//! ```text
//!   supervisor side                          body side
//!   ───────────────                          ─────────
//!   wait_either(timeout) ◄──┐          ┌──── set(Ready)
//!   is_set(Shutdown)     ◄──┼── word ──┼──── finish(faulted)
//!                           │          │
//!             Memory: watch::Sender<u32>   (cooperative task)
//!             Shared: AtomicU32 in MAP_SHARED page (forked process)
//! ```
//!
//! ## Rules
//! - Both flags live in **one word**; every transition is a single atomic update.
//! - `finish()` sets `Shutdown` and clears `Ready` together, so no observer ever
//!   sees both flags set.
//! - `Shutdown` is terminal: once set, `set(Ready)` and `clear(Shutdown)` are ignored.
//! - Two latched bits are kept for state reporting: `served` (ready was set at
//!   least once) and `faulted` (serving ended with a failure).
//! - The primitive family is picked once from the [`ExecutionModel`] and never
//!   leaks out of this module.

mod memory;
mod shared;

use std::time::Duration;

use crate::config::ExecutionModel;
use crate::error::PeaError;

use memory::MemoryWord;
use shared::SharedWord;

const READY: u32 = 1;
const SHUTDOWN: u32 = 1 << 1;
const SERVED: u32 = 1 << 2;
const FAULTED: u32 = 1 << 3;

/// One of the two observable flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    /// The runtime finished `setup()` and is serving.
    Ready,
    /// The lifecycle body has finished.
    Shutdown,
}

impl Flag {
    #[inline]
    fn bit(self) -> u32 {
        match self {
            Flag::Ready => READY,
            Flag::Shutdown => SHUTDOWN,
        }
    }
}

/// Point-in-time view of all bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Signals {
    /// `Ready` is set.
    pub ready: bool,
    /// `Shutdown` is set.
    pub shutdown: bool,
    /// `Ready` was set at least once.
    pub served: bool,
    /// Serving ended with a failure.
    pub faulted: bool,
}

impl From<u32> for Signals {
    fn from(w: u32) -> Self {
        Self {
            ready: w & READY != 0,
            shutdown: w & SHUTDOWN != 0,
            served: w & SERVED != 0,
            faulted: w & FAULTED != 0,
        }
    }
}

#[derive(Clone)]
enum Cell {
    Memory(MemoryWord),
    Shared(SharedWord),
}

/// Two-flag signal with a combined wait; cheap to clone (all clones share state).
#[derive(Clone)]
pub struct DualEvent {
    cell: Cell,
}

impl DualEvent {
    /// Creates the primitive matching `model`.
    ///
    /// Fails only when the shared page for an isolated context cannot be mapped.
    pub fn new(model: ExecutionModel) -> Result<Self, PeaError> {
        match model {
            ExecutionModel::Cooperative => Ok(Self::in_memory()),
            ExecutionModel::Isolated => Self::shared(),
        }
    }

    /// In-process variant.
    pub fn in_memory() -> Self {
        Self {
            cell: Cell::Memory(MemoryWord::new()),
        }
    }

    /// Variant visible to a forked child process.
    pub fn shared() -> Result<Self, PeaError> {
        Ok(Self {
            cell: Cell::Shared(SharedWord::new()?),
        })
    }

    /// Sets `flag`. Setting `Ready` also latches `served`.
    pub fn set(&self, flag: Flag) {
        self.update(|w| match flag {
            Flag::Ready if w & SHUTDOWN != 0 => w,
            Flag::Ready => w | READY | SERVED,
            Flag::Shutdown => w | SHUTDOWN,
        });
    }

    /// Clears `flag`.
    pub fn clear(&self, flag: Flag) {
        self.update(|w| match flag {
            Flag::Ready => w & !READY,
            Flag::Shutdown => w,
        });
    }

    /// Returns whether `flag` is currently set.
    #[inline]
    pub fn is_set(&self, flag: Flag) -> bool {
        self.load() & flag.bit() != 0
    }

    /// Final transition of the lifecycle body: shutdown set, ready cleared.
    pub fn finish(&self, faulted: bool) {
        let fault = if faulted { FAULTED } else { 0 };
        self.update(|w| (w & !READY) | SHUTDOWN | fault);
    }

    /// Returns all bits at once.
    #[inline]
    pub fn snapshot(&self) -> Signals {
        Signals::from(self.load())
    }

    /// Blocks until `flag` is set; `None` waits forever.
    ///
    /// Returns `false` when the timeout elapsed first.
    pub async fn wait(&self, flag: Flag, timeout: Option<Duration>) -> bool {
        let bit = flag.bit();
        self.wait_until(move |w| w & bit != 0, timeout).await
    }

    /// Blocks until either flag is set; `None` waits forever.
    ///
    /// Returns `false` when the timeout elapsed first.
    pub async fn wait_either(&self, timeout: Option<Duration>) -> bool {
        self.wait_until(|w| w & (READY | SHUTDOWN) != 0, timeout)
            .await
    }

    async fn wait_until<P>(&self, pred: P, timeout: Option<Duration>) -> bool
    where
        P: Fn(u32) -> bool + Send + Sync,
    {
        let fut = async {
            match &self.cell {
                Cell::Memory(m) => m.wait_until(&pred).await,
                Cell::Shared(s) => s.wait_until(&pred).await,
            }
        };
        match timeout {
            Some(t) => tokio::time::timeout(t, fut).await.unwrap_or(false),
            None => fut.await,
        }
    }

    #[inline]
    fn load(&self) -> u32 {
        match &self.cell {
            Cell::Memory(m) => m.load(),
            Cell::Shared(s) => s.load(),
        }
    }

    #[inline]
    fn update(&self, f: impl Fn(u32) -> u32) {
        match &self.cell {
            Cell::Memory(m) => m.update(f),
            Cell::Shared(s) => s.update(f),
        }
    }
}

impl std::fmt::Debug for DualEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.cell {
            Cell::Memory(_) => "memory",
            Cell::Shared(_) => "shared",
        };
        f.debug_struct("DualEvent")
            .field("kind", &kind)
            .field("signals", &self.snapshot())
            .finish()
    }
}
