//! In-process signal word backed by [`tokio::sync::watch`].

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Clone)]
pub(super) struct MemoryWord {
    tx: Arc<watch::Sender<u32>>,
}

impl MemoryWord {
    pub(super) fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub(super) fn load(&self) -> u32 {
        *self.tx.borrow()
    }

    pub(super) fn update(&self, f: impl Fn(u32) -> u32) {
        self.tx.send_if_modified(|w| {
            let next = f(*w);
            let changed = next != *w;
            *w = next;
            changed
        });
    }

    pub(super) async fn wait_until(&self, pred: &(dyn Fn(u32) -> bool + Send + Sync)) -> bool {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only fails if it was dropped.
        rx.wait_for(|w| pred(*w)).await.is_ok()
    }
}
