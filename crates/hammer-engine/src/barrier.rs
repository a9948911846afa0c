//! Completion barriers: the synchronizers that decide when workers stop.
//!
//! Two variants exist. A [`CountedBarrier`] admits exactly `N` units of
//! work across all workers and signals done once the `N`th is reported
//! complete. A [`TimedBarrier`] admits work until a deadline elapses. Both
//! expose the same small surface (`try_grab_work`, `job_done`, `done`,
//! `cancel`, `completed`) through the [`Barrier`] enum, so the worker pool
//! doesn't need to know which variant it's driving.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

/// A one-shot notification visible to any number of observers. Cheap to
/// clone; all clones share the same underlying flag and waiter queue.
///
/// `tokio::sync::Notify::notify_waiters` only wakes tasks that are already
/// waiting, so every observer must check the flag before awaiting it -
/// otherwise a notification that fires between the flag check and the
/// `notified().await` call would be missed.
#[derive(Clone)]
pub struct DoneSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl DoneSignal {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Raise the signal. Idempotent: subsequent calls are no-ops.
    pub fn fire(&self) {
        if !self.flag.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_done(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Resolve once the signal has fired, immediately if it already has.
    pub async fn notified(&self) {
        if self.is_done() {
            return;
        }
        let notified = self.notify.notified();
        if self.is_done() {
            return;
        }
        notified.await;
    }
}

impl Default for DoneSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// State held by the counted barrier variant.
pub struct CountedBarrier {
    total: u64,
    remaining: AtomicI64,
    completed: AtomicU64,
    done: DoneSignal,
}

impl CountedBarrier {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            remaining: AtomicI64::new(total as i64),
            completed: AtomicU64::new(0),
            done: DoneSignal::new(),
        }
    }

    /// Atomically decrement `remaining`; admits work iff the
    /// pre-decrement value was positive. Never admits more than `total`
    /// jobs across all callers, even under heavy concurrency.
    pub fn try_grab_work(&self) -> bool {
        self.remaining.fetch_sub(1, Ordering::AcqRel) > 0
    }

    pub fn job_done(&self) {
        let done_count = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if done_count == self.total {
            self.remaining.store(0, Ordering::Release);
            self.done.fire();
        }
    }

    pub fn done(&self) -> DoneSignal {
        self.done.clone()
    }

    pub fn cancel(&self) {
        self.remaining.store(0, Ordering::Release);
        self.done.fire();
    }

    pub fn completed(&self) -> f64 {
        if self.done.is_done() {
            1.0
        } else {
            self.completed.load(Ordering::Acquire) as f64 / self.total as f64
        }
    }
}

/// State held by the timed barrier variant. A background task fires the
/// done signal at `start + duration`.
pub struct TimedBarrier {
    start: Instant,
    duration: Duration,
    done_flag: AtomicBool,
    done: DoneSignal,
}

impl TimedBarrier {
    /// Spawn a timed barrier whose done signal fires once `duration` has
    /// elapsed since construction.
    pub fn spawn(duration: Duration) -> Arc<Self> {
        let barrier = Arc::new(Self {
            start: Instant::now(),
            duration,
            done_flag: AtomicBool::new(false),
            done: DoneSignal::new(),
        });
        let handle = Arc::clone(&barrier);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            handle.done_flag.store(true, Ordering::Release);
            handle.done.fire();
        });
        barrier
    }

    pub fn try_grab_work(&self) -> bool {
        !self.done_flag.load(Ordering::Acquire)
    }

    pub fn job_done(&self) {}

    pub fn done(&self) -> DoneSignal {
        self.done.clone()
    }

    pub fn cancel(&self) {
        self.done_flag.store(true, Ordering::Release);
        self.done.fire();
    }

    pub fn completed(&self) -> f64 {
        if self.done_flag.load(Ordering::Acquire) {
            1.0
        } else {
            let fraction = self.start.elapsed().as_secs_f64() / self.duration.as_secs_f64();
            fraction.min(1.0)
        }
    }
}

/// Tagged union over the two barrier variants, shared by reference among
/// workers and the auxiliary tasks.
pub enum Barrier {
    Counted(CountedBarrier),
    Timed(Arc<TimedBarrier>),
}

impl Barrier {
    pub fn counted(total: u64) -> Self {
        Barrier::Counted(CountedBarrier::new(total))
    }

    pub fn timed(duration: Duration) -> Self {
        Barrier::Timed(TimedBarrier::spawn(duration))
    }

    pub fn try_grab_work(&self) -> bool {
        match self {
            Barrier::Counted(b) => b.try_grab_work(),
            Barrier::Timed(b) => b.try_grab_work(),
        }
    }

    pub fn job_done(&self) {
        match self {
            Barrier::Counted(b) => b.job_done(),
            Barrier::Timed(b) => b.job_done(),
        }
    }

    pub fn done(&self) -> DoneSignal {
        match self {
            Barrier::Counted(b) => b.done(),
            Barrier::Timed(b) => b.done(),
        }
    }

    pub fn cancel(&self) {
        match self {
            Barrier::Counted(b) => b.cancel(),
            Barrier::Timed(b) => b.cancel(),
        }
    }

    pub fn completed(&self) -> f64 {
        match self {
            Barrier::Counted(b) => b.completed(),
            Barrier::Timed(b) => b.completed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn counted_barrier_admits_exactly_n() {
        let barrier = Arc::new(CountedBarrier::new(100));
        let admitted = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let admitted = Arc::clone(&admitted);
                thread::spawn(move || {
                    while barrier.try_grab_work() {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(admitted.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn job_done_reaches_done_exactly_once() {
        let barrier = CountedBarrier::new(3);
        assert!(!barrier.done().is_done());
        barrier.job_done();
        barrier.job_done();
        assert!(!barrier.done().is_done());
        barrier.job_done();
        assert!(barrier.done().is_done());
        assert_eq!(barrier.completed(), 1.0);
    }

    #[test]
    fn cancel_forces_completed_to_one() {
        let barrier = CountedBarrier::new(10);
        barrier.job_done();
        assert!(barrier.completed() < 1.0);
        barrier.cancel();
        assert_eq!(barrier.completed(), 1.0);
        // idempotent
        barrier.cancel();
        assert_eq!(barrier.completed(), 1.0);
    }

    #[tokio::test]
    async fn timed_barrier_fires_after_duration() {
        let barrier = TimedBarrier::spawn(Duration::from_millis(20));
        assert!(barrier.try_grab_work());
        barrier.done().notified().await;
        assert!(!barrier.try_grab_work());
        assert_eq!(barrier.completed(), 1.0);
    }

    #[tokio::test]
    async fn done_signal_resolves_immediately_once_fired() {
        let signal = DoneSignal::new();
        signal.fire();
        // Must not hang even though no one was waiting when it fired.
        signal.notified().await;
    }
}
