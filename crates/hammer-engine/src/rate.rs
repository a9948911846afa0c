//! Rate estimation and the token-bucket limiter that paces worker issuance.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::barrier::DoneSignal;

/// Default interval the token bucket is tuned against. Keeps scheduling
/// overhead low while preserving sub-5% rate accuracy for rates >= 100.
pub const DEFAULT_ADJUST_INTERVAL: Duration = Duration::from_millis(10);

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Given a target `rate` (requests/second) and a desired `adjust_to`
/// interval, compute `(fill_interval, quantum)` such that
/// `quantum / fill_interval ~= rate`, reducing the `rate : 1s` fraction by
/// its GCD and then scaling up until `fill_interval >= adjust_to`.
///
/// Panics if `rate == 0` or `adjust_to` is zero/negative, mirroring a
/// programmer error that should never reach production configuration
/// (config validation rejects a zero rate before the engine ever calls
/// this).
pub fn estimate(rate: u64, adjust_to: Duration) -> (Duration, u64) {
    assert!(rate != 0, "rate can't be zero");
    assert!(!adjust_to.is_zero(), "adjust_to can't be zero or negative");

    let one_second_ns = 1_000_000_000u64;
    let divisor = gcd(rate, one_second_ns);
    let (reduced_rate, reduced_interval_ns) = (rate / divisor, one_second_ns / divisor);

    let adjust_ns = adjust_to.as_nanos() as u64;
    if reduced_interval_ns >= adjust_ns {
        return (Duration::from_nanos(reduced_interval_ns), reduced_rate);
    }
    let coefficient = adjust_ns / reduced_interval_ns;
    (
        Duration::from_nanos(coefficient * reduced_interval_ns),
        coefficient * reduced_rate,
    )
}

/// Outcome of a pacing wait: either the limiter let the caller continue,
/// or the caller was cancelled (the barrier's done signal fired) while
/// waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceOutcome {
    Continue,
    Break,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Continuous-refill token bucket. Tokens accrue proportionally to elapsed
/// time since the last take, clamped to the bucket size; the bucket starts
/// full.
struct TokenBucket {
    state: Mutex<BucketState>,
    quantum: u64,
    fill_interval: Duration,
}

impl TokenBucket {
    fn new(rate: u64) -> Self {
        let (fill_interval, quantum) = estimate(rate, DEFAULT_ADJUST_INTERVAL);
        Self {
            state: Mutex::new(BucketState {
                tokens: quantum as f64,
                last_refill: Instant::now(),
            }),
            quantum,
            fill_interval,
        }
    }

    /// Attempt to take one token. Returns `None` if a token was
    /// immediately available, or `Some(wait)` naming how long the caller
    /// should wait before a token becomes available.
    fn take_one(&self) -> Option<Duration> {
        let refill_rate = self.quantum as f64 / self.fill_interval.as_secs_f64();
        let mut state = self.state.lock().expect("token bucket lock poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * refill_rate).min(self.quantum as f64);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - state.tokens;
            Some(Duration::from_secs_f64(deficit / refill_rate))
        }
    }
}

/// Paces worker request issuance. Model as a tagged variant rather than a
/// trait object: the set of strategies is closed and known at
/// construction time.
pub enum Limiter {
    Noop,
    TokenBucket(TokenBucket),
}

impl Limiter {
    pub fn noop() -> Self {
        Limiter::Noop
    }

    pub fn rate_limited(rate: u64) -> Self {
        Limiter::TokenBucket(TokenBucket::new(rate))
    }

    /// The limiter's own tuned `(fill_interval, quantum)`, used by the RPS
    /// sampler to derive its tick interval. `None` for the no-op limiter.
    pub fn tuning(&self) -> Option<(Duration, u64)> {
        match self {
            Limiter::Noop => None,
            Limiter::TokenBucket(b) => Some((b.fill_interval, b.quantum)),
        }
    }

    /// Wait for a token, or until `done` fires, whichever comes first.
    pub async fn pace(&self, done: &DoneSignal) -> PaceOutcome {
        match self {
            Limiter::Noop => PaceOutcome::Continue,
            Limiter::TokenBucket(bucket) => match bucket.take_one() {
                None => PaceOutcome::Continue,
                Some(wait) => {
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => PaceOutcome::Continue,
                        _ = done.notified() => PaceOutcome::Break,
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "rate can't be zero")]
    fn estimate_panics_on_zero_rate() {
        estimate(0, DEFAULT_ADJUST_INTERVAL);
    }

    #[test]
    #[should_panic(expected = "adjust_to can't be zero or negative")]
    fn estimate_panics_on_zero_adjust_to() {
        estimate(100, Duration::ZERO);
    }

    #[test]
    fn estimate_approximates_requested_rate() {
        let (fill_interval, quantum) = estimate(5_000, DEFAULT_ADJUST_INTERVAL);
        let approx_rate = quantum as f64 / fill_interval.as_secs_f64();
        assert!((approx_rate - 5_000.0).abs() < 1.0, "got {approx_rate}");
        assert!(fill_interval >= DEFAULT_ADJUST_INTERVAL);
    }

    #[tokio::test]
    async fn noop_limiter_never_waits() {
        let limiter = Limiter::noop();
        let done = DoneSignal::new();
        assert_eq!(limiter.pace(&done).await, PaceOutcome::Continue);
    }

    #[tokio::test]
    async fn bucket_limiter_breaks_on_cancellation() {
        let limiter = Limiter::rate_limited(1);
        let done = DoneSignal::new();
        // Drain the initial burst of tokens before forcing a real wait.
        let (_, quantum) = limiter.tuning().unwrap();
        for _ in 0..quantum {
            let _ = limiter.pace(&done).await;
        }
        done.fire();
        assert_eq!(limiter.pace(&done).await, PaceOutcome::Break);
    }
}
