//! Per-connection byte accounting.
//!
//! The engine only ever sees two shared atomic totals; the actual
//! interposing at the socket boundary is the transport implementation's
//! responsibility (see `hammer-client`'s byte-counting adapter).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    read: AtomicI64,
    written: AtomicI64,
}

/// Cheaply-cloneable handle to the run's shared byte counters.
#[derive(Clone, Default)]
pub struct ByteCounters {
    inner: Arc<Inner>,
}

impl ByteCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_read(&self, n: i64) {
        self.inner.read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_written(&self, n: i64) {
        self.inner.written.fetch_add(n, Ordering::Relaxed);
    }

    pub fn bytes_read(&self) -> i64 {
        self.inner.read.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> i64 {
        self.inner.written.load(Ordering::Relaxed)
    }
}
