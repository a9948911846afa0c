//! Progress reporting and the requests-per-second sampler.
//!
//! Two auxiliary tasks run alongside the worker pool: a progress updater
//! that ticks on the barrier's completion fraction, and an RPS sampler
//! that periodically turns a window of completed requests into a sample
//! recorded in the RPS histogram. Both are decoupled from the per-request
//! hot path - workers only ever touch an atomic counter here, never a
//! clock or a lock that isn't already trivial.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::barrier::DoneSignal;
use crate::histogram::RpsHistogram;
use crate::rate::Limiter;

/// Minimum RPS sampler tick interval; also the unrated default (two times
/// the 10ms default adjust interval).
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(20);

/// The window a worker reports completions into and the sampler drains.
/// The completion counter is atomic so the hot path never takes a lock;
/// only the window's start time needs the mutex, and only the sampler
/// touches it.
pub struct RpsWindow {
    reqs_in_window: AtomicI64,
    window_start: Mutex<Instant>,
}

impl RpsWindow {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            reqs_in_window: AtomicI64::new(0),
            window_start: Mutex::new(Instant::now()),
        })
    }

    /// Called by a worker immediately after a completed request, success
    /// or failure.
    pub fn record_completion(&self) {
        self.reqs_in_window.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically read and reset the window, returning
    /// `(requests, elapsed)` since the window's last reset.
    fn drain(&self) -> (i64, Duration) {
        let mut start = self.window_start.lock().expect("rps window lock poisoned");
        let elapsed = start.elapsed();
        let reqs = self.reqs_in_window.swap(0, Ordering::Relaxed);
        *start = Instant::now();
        (reqs, elapsed)
    }
}

/// Derive the RPS sampler's tick interval: `max(10ms, fill_interval) +
/// 10ms` when rate-limited, or `20ms` otherwise.
pub fn sample_interval(limiter: &Limiter) -> Duration {
    match limiter.tuning() {
        Some((fill_interval, _)) => fill_interval.max(Duration::from_millis(10)) + Duration::from_millis(10),
        None => MIN_SAMPLE_INTERVAL,
    }
}

/// Run the RPS sampler until `done` fires, recording one final sample
/// before returning.
pub async fn run_rps_sampler(window: Arc<RpsWindow>, histogram: Arc<RpsHistogram>, done: DoneSignal, interval: Duration) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                record_sample(&window, &histogram);
            }
            _ = done.notified() => {
                record_sample(&window, &histogram);
                break;
            }
        }
    }
}

fn record_sample(window: &RpsWindow, histogram: &RpsHistogram) {
    let (reqs, elapsed) = window.drain();
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        histogram.record(reqs as f64 / secs);
    }
}

/// A terminal progress indicator. The `hammer-cli` crate supplies the
/// concrete `indicatif` bar through this trait so the engine stays free
/// of presentation concerns.
pub trait ProgressSink: Send + Sync {
    fn set_fraction(&self, fraction: f64);
    fn finish(&self);
}

/// A no-op sink used when `--no-print` (or an equivalent print-spec
/// without `progress`) is in effect.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn set_fraction(&self, _fraction: f64) {}
    fn finish(&self) {}
}

/// Run the progress updater until `done` fires.
pub async fn run_progress_task(
    barrier_completed: impl Fn() -> f64 + Send + Sync,
    sink: Arc<dyn ProgressSink>,
    done: DoneSignal,
    refresh_rate: Duration,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(refresh_rate) => {
                sink.set_fraction(barrier_completed());
            }
            _ = done.notified() => {
                sink.set_fraction(1.0);
                sink.finish();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_drains_and_resets() {
        let window = RpsWindow::new();
        window.record_completion();
        window.record_completion();
        let (reqs, _) = window.drain();
        assert_eq!(reqs, 2);
        let (reqs_after, _) = window.drain();
        assert_eq!(reqs_after, 0);
    }

    #[test]
    fn sample_interval_defaults_to_20ms_unrated() {
        assert_eq!(sample_interval(&Limiter::noop()), MIN_SAMPLE_INTERVAL);
    }

    #[test]
    fn sample_interval_derives_from_rate() {
        let limiter = Limiter::rate_limited(50_000);
        let interval = sample_interval(&limiter);
        assert!(interval >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn rps_sampler_records_a_final_sample_on_done() {
        let window = RpsWindow::new();
        let histogram = Arc::new(RpsHistogram::with_defaults());
        let done = DoneSignal::new();
        window.record_completion();
        done.fire();
        run_rps_sampler(window, Arc::clone(&histogram), done, Duration::from_secs(10)).await;
        assert_eq!(histogram.count(), 1);
    }
}
