//! Cross-process signal word: an `AtomicU32` in an anonymous `MAP_SHARED` page.
//!
//! The page is mapped before `fork()`, so parent and child see the same word.
//! There is no cross-process wakeup primitive here; waiters poll.

use std::num::NonZeroUsize;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use nix::sys::mman::{MapFlags, ProtFlags, mmap_anonymous, munmap};

use crate::error::PeaError;

/// Poll interval for waiters on the shared word.
const POLL: Duration = Duration::from_millis(5);

#[derive(Clone)]
pub(super) struct SharedWord {
    page: Arc<Page>,
}

struct Page {
    ptr: NonNull<AtomicU32>,
    len: NonZeroUsize,
}

// SAFETY: the page only ever holds an `AtomicU32`, which is `Send + Sync`.
unsafe impl Send for Page {}
// SAFETY: see above; all access goes through atomic operations.
unsafe impl Sync for Page {}

impl Page {
    #[inline]
    fn word(&self) -> &AtomicU32 {
        // SAFETY: `ptr` points into a live, zero-initialized, suitably aligned mapping
        // that is unmapped only in `Drop`.
        unsafe { self.ptr.as_ref() }
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` are exactly what `mmap_anonymous` returned and nothing
        // borrows the word past the last `Arc<Page>`.
        if let Err(err) = unsafe { munmap(self.ptr.cast(), self.len.get()) } {
            tracing::warn!(error = %err, "failed to unmap shared signal page");
        }
    }
}

impl SharedWord {
    pub(super) fn new() -> Result<Self, PeaError> {
        let len = NonZeroUsize::new(std::mem::size_of::<AtomicU32>()).ok_or_else(|| {
            PeaError::Context {
                reason: "zero-sized signal word".into(),
            }
        })?;

        // SAFETY: a fresh anonymous mapping aliases nothing; the kernel zero-fills it
        // and page alignment satisfies `AtomicU32`.
        let ptr = unsafe {
            mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )
        }
        .map_err(|err| PeaError::Context {
            reason: format!("mmap shared signal page: {err}"),
        })?;

        Ok(Self {
            page: Arc::new(Page {
                ptr: ptr.cast(),
                len,
            }),
        })
    }

    pub(super) fn load(&self) -> u32 {
        self.page.word().load(Ordering::SeqCst)
    }

    pub(super) fn update(&self, f: impl Fn(u32) -> u32) {
        let _ = self
            .page
            .word()
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| Some(f(w)));
    }

    pub(super) async fn wait_until(&self, pred: &(dyn Fn(u32) -> bool + Send + Sync)) -> bool {
        loop {
            if pred(self.load()) {
                return true;
            }
            tokio::time::sleep(POLL).await;
        }
    }
}
