//! The worker pool and orchestrator: the piece that couples every other
//! module in this crate to a concrete [`HttpClient`] and drives the run to
//! completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use crate::barrier::Barrier;
use crate::bytes::ByteCounters;
use crate::client::{HttpClient, StatusClass};
use crate::config::{Settings, TerminationPolicy};
use crate::error::EngineError;
use crate::error_map::ErrorMap;
use crate::histogram::{Histogram, RpsHistogram};
use crate::progress::{self, NullProgress, ProgressSink, RpsWindow};
use crate::rate::Limiter;
use crate::report::{aggregate_latency_histogram, aggregate_rps_histogram, RunReport, StatusClassCounts};
use crate::signal;

/// How often the progress task samples the barrier's completion fraction.
const PROGRESS_REFRESH_RATE: Duration = Duration::from_millis(100);

/// Percentiles reported alongside mean/stddev/max.
const REPORTED_PERCENTILES: &[f64] = &[0.5, 0.75, 0.9, 0.95, 0.99];

/// Shared state every worker and auxiliary task holds a reference to.
struct Shared {
    barrier: Arc<Barrier>,
    limiter: Limiter,
    client: Arc<dyn HttpClient>,
    latencies: Histogram,
    latencies_2xx: Option<Histogram>,
    error_map: ErrorMap,
    status_classes: StatusCounters,
    byte_counters: ByteCounters,
    rps_window: Arc<RpsWindow>,
}

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct StatusCounters {
    informational: AtomicU64,
    success: AtomicU64,
    redirection: AtomicU64,
    client_error: AtomicU64,
    server_error: AtomicU64,
    other: AtomicU64,
}

impl StatusCounters {
    fn record(&self, class: StatusClass) {
        let counter = match class {
            StatusClass::Informational => &self.informational,
            StatusClass::Success => &self.success,
            StatusClass::Redirection => &self.redirection,
            StatusClass::ClientError => &self.client_error,
            StatusClass::ServerError => &self.server_error,
            StatusClass::Other => &self.other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatusClassCounts {
        StatusClassCounts {
            informational: self.informational.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            redirection: self.redirection.load(Ordering::Relaxed),
            client_error: self.client_error.load(Ordering::Relaxed),
            server_error: self.server_error.load(Ordering::Relaxed),
            other: self.other.load(Ordering::Relaxed),
        }
    }
}

/// The load-driving engine. Construction validates `settings`; `run`
/// drives the worker pool to completion and returns the aggregated
/// report.
pub struct Engine {
    settings: Settings,
}

impl Engine {
    /// Validate `settings` and construct an engine ready to run.
    pub fn new(settings: Settings) -> Result<Self, EngineError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Drive the run to completion: spawn exactly `connections` workers
    /// plus the progress and RPS auxiliary tasks, wait for everything to
    /// finish (or for an external cancellation), and return the
    /// aggregated report.
    ///
    /// `byte_counters` is shared with whatever constructed `client` -
    /// engine, client, and transport adapter all hold the same handle so
    /// the final report reads the totals the transport actually wrote.
    pub async fn run(
        &self,
        client: Arc<dyn HttpClient>,
        byte_counters: ByteCounters,
        progress_sink: Option<Arc<dyn ProgressSink>>,
    ) -> RunReport {
        let barrier = Arc::new(match self.settings.termination {
            TerminationPolicy::Requests(n) => Barrier::counted(n),
            TerminationPolicy::Duration(d) => Barrier::timed(d),
        });
        let limiter = match self.settings.rate {
            Some(rate) => Limiter::rate_limited(rate),
            None => Limiter::noop(),
        };

        let shared = Arc::new(Shared {
            barrier: Arc::clone(&barrier),
            limiter,
            client,
            latencies: Histogram::with_defaults(),
            // Always aggregated - cheap relative to the full histogram, and
            // whether it's printed is purely a report-rendering decision
            // (the `-l/--latencies` flag) made outside this crate.
            latencies_2xx: Some(Histogram::with_defaults()),
            error_map: ErrorMap::new(),
            status_classes: StatusCounters::default(),
            byte_counters,
            rps_window: RpsWindow::new(),
        });

        let progress_sink = progress_sink.unwrap_or_else(|| Arc::new(NullProgress));
        let rps_histogram = Arc::new(RpsHistogram::with_defaults());
        let signal_task = signal::wire_ctrl_c(Arc::clone(&barrier));

        let start = Instant::now();

        let mut worker_handles = Vec::with_capacity(self.settings.connections as usize);
        for _ in 0..self.settings.connections {
            let shared = Arc::clone(&shared);
            worker_handles.push(tokio::spawn(async move { worker_loop(shared).await }));
        }

        let progress_task = {
            let barrier = Arc::clone(&barrier);
            let done = barrier.done();
            let sink = Arc::clone(&progress_sink);
            tokio::spawn(async move {
                progress::run_progress_task(move || barrier.completed(), sink, done, PROGRESS_REFRESH_RATE).await;
            })
        };

        let rps_task = {
            let window = Arc::clone(&shared.rps_window);
            let histogram = Arc::clone(&rps_histogram);
            let done = barrier.done();
            let interval = progress::sample_interval(&shared.limiter);
            tokio::spawn(async move {
                progress::run_rps_sampler(window, histogram, done, interval).await;
            })
        };

        for handle in worker_handles {
            if let Err(err) = handle.await {
                debug!("worker task panicked: {err}");
            }
        }
        let elapsed = start.elapsed();

        let _ = progress_task.await;
        let _ = rps_task.await;
        let _ = signal_task.await;

        RunReport {
            bytes_read: shared.byte_counters.bytes_read(),
            bytes_written: shared.byte_counters.bytes_written(),
            elapsed,
            status_classes: shared.status_classes.snapshot(),
            errors_by_frequency: shared.error_map.by_frequency(),
            latencies: aggregate_latency_histogram(&shared.latencies, REPORTED_PERCENTILES),
            latencies_2xx: shared
                .latencies_2xx
                .as_ref()
                .map(|h| aggregate_latency_histogram(h, REPORTED_PERCENTILES)),
            rps: aggregate_rps_histogram(&rps_histogram, REPORTED_PERCENTILES),
        }
    }
}

async fn worker_loop(shared: Arc<Shared>) {
    let done = shared.barrier.done();
    loop {
        if !shared.barrier.try_grab_work() {
            break;
        }
        if shared.limiter.pace(&done).await == crate::rate::PaceOutcome::Break {
            break;
        }

        let outcome = shared.client.execute().await;

        if let Some(error) = &outcome.error {
            shared.error_map.add(error);
        }
        shared.latencies.increment(outcome.micros);
        let class = outcome.status_class();
        if class == StatusClass::Success {
            if let Some(h) = &shared.latencies_2xx {
                h.increment(outcome.micros);
            }
        }
        shared.status_classes.record(class);
        shared.rps_window.record_completion();

        shared.barrier.job_done();
    }
}
