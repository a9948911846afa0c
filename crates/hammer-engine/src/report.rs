//! Result aggregation: deriving summary statistics from the histograms and
//! assembling the final report record.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error_map::ErrorMap;
use crate::histogram::{Histogram, RpsHistogram};

/// Summary statistics derived from a single histogram.
#[derive(Debug, Clone, Default)]
pub struct HistogramStats {
    pub count: u64,
    pub sum: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub percentiles: BTreeMap<String, f64>,
}

fn percentile_key(p: f64) -> String {
    format!("{:.4}", p)
}

/// Walk `visit` (already sorted ascending by key, which `visit_all`'s
/// natural shard order does not guarantee - callers must sort first) once
/// to compute count/sum/max/mean/stddev, and a second time to resolve
/// percentiles by accumulating until the cumulative count reaches
/// `ceil(p * count)`.
fn aggregate(mut samples: Vec<(f64, u64)>, percentiles: &[f64]) -> HistogramStats {
    samples.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("samples are never NaN"));

    let count: u64 = samples.iter().map(|(_, c)| c).sum();
    if count == 0 {
        return HistogramStats::default();
    }

    let sum: f64 = samples.iter().map(|(key, c)| key * (*c as f64)).sum();
    let max = samples.last().map(|(key, _)| *key).unwrap_or(0.0);
    let mean = sum / count as f64;

    let stddev = if count < 2 {
        0.0
    } else {
        let variance_sum: f64 = samples
            .iter()
            .map(|(key, c)| (key - mean).powi(2) * (*c as f64))
            .sum();
        (variance_sum / count as f64).sqrt()
    };

    let mut pct_map = BTreeMap::new();
    for &p in percentiles {
        if !(0.0..=1.0).contains(&p) {
            continue;
        }
        let rank = (p * count as f64).ceil() as u64;
        let rank = rank.max(1);
        let mut cumulative = 0u64;
        let mut resolved = max;
        for (key, c) in &samples {
            cumulative += c;
            if cumulative >= rank {
                resolved = *key;
                break;
            }
        }
        pct_map.insert(percentile_key(p), resolved);
    }

    HistogramStats {
        count,
        sum,
        max,
        mean,
        stddev,
        percentiles: pct_map,
    }
}

pub fn aggregate_latency_histogram(histogram: &Histogram, percentiles: &[f64]) -> HistogramStats {
    let mut samples = Vec::new();
    histogram.visit_all(|key, count| {
        samples.push((key as f64, count));
        true
    });
    aggregate(samples, percentiles)
}

pub fn aggregate_rps_histogram(histogram: &RpsHistogram, percentiles: &[f64]) -> HistogramStats {
    let mut samples = Vec::new();
    histogram.visit_all(|key, count| {
        samples.push((key, count));
        true
    });
    aggregate(samples, percentiles)
}

/// Tally of responses by status-class, plus the count of per-request
/// errors (transport failures, timeouts).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusClassCounts {
    pub informational: u64,
    pub success: u64,
    pub redirection: u64,
    pub client_error: u64,
    pub server_error: u64,
    pub other: u64,
}

/// The final, denormalized result record produced by a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub bytes_read: i64,
    pub bytes_written: i64,
    pub elapsed: Duration,
    pub status_classes: StatusClassCounts,
    pub errors_by_frequency: Vec<(String, u64)>,
    pub latencies: HistogramStats,
    pub latencies_2xx: Option<HistogramStats>,
    pub rps: HistogramStats,
}

impl RunReport {
    pub fn total_requests(&self) -> u64 {
        let c = &self.status_classes;
        c.informational + c.success + c.redirection + c.client_error + c.server_error + c.other
    }

    pub fn total_errors(errors: &ErrorMap) -> u64 {
        errors.total()
    }
}
