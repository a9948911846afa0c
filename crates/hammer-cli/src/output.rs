//! Report formatting: plain-text table, JSON, or a user-supplied
//! `tinytemplate` template rendered against the same view.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tabled::{Table, Tabled};
use tinytemplate::TinyTemplate;

use hammer_engine::config::Settings;
use hammer_engine::report::{HistogramStats, RunReport};

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to read template file {0}: {1}")]
    TemplateFile(PathBuf, std::io::Error),

    #[error("template render failed: {0}")]
    TemplateRender(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a rendered report needs: the configuration that produced
/// the run, plus its aggregated result.
#[derive(Debug, Serialize)]
pub struct ReportView {
    pub spec: SpecView,
    pub result: ResultView,
}

#[derive(Debug, Serialize)]
pub struct SpecView {
    pub connections: u64,
    pub target: String,
    pub method: String,
    pub timeout_ms: u128,
    pub rate: Option<u64>,
    pub client_variant: String,
}

#[derive(Debug, Serialize)]
pub struct ResultView {
    pub elapsed_ms: u128,
    pub total_requests: u64,
    pub bytes_read: i64,
    pub bytes_written: i64,
    pub status_classes: StatusClassView,
    pub latencies: HistogramView,
    pub latencies_2xx: Option<HistogramView>,
    pub rps: HistogramView,
    pub errors: Vec<ErrorFrequencyView>,
}

#[derive(Debug, Serialize)]
pub struct StatusClassView {
    pub informational: u64,
    pub success: u64,
    pub redirection: u64,
    pub client_error: u64,
    pub server_error: u64,
    pub other: u64,
}

#[derive(Debug, Serialize, Clone)]
pub struct HistogramView {
    pub count: u64,
    pub mean: f64,
    pub stddev: f64,
    pub max: f64,
    pub percentiles: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorFrequencyView {
    pub message: String,
    pub count: u64,
}

impl From<&HistogramStats> for HistogramView {
    fn from(stats: &HistogramStats) -> Self {
        Self {
            count: stats.count,
            mean: stats.mean,
            stddev: stats.stddev,
            max: stats.max,
            percentiles: stats.percentiles.clone(),
        }
    }
}

impl ReportView {
    pub fn new(settings: &Settings, report: &RunReport) -> Self {
        Self {
            spec: SpecView {
                connections: settings.connections,
                target: settings.target.clone(),
                method: settings.method.as_str().to_string(),
                timeout_ms: settings.timeout.as_millis(),
                rate: settings.rate,
                client_variant: format!("{:?}", settings.client_variant),
            },
            result: ResultView {
                elapsed_ms: report.elapsed.as_millis(),
                total_requests: report.total_requests(),
                bytes_read: report.bytes_read,
                bytes_written: report.bytes_written,
                status_classes: StatusClassView {
                    informational: report.status_classes.informational,
                    success: report.status_classes.success,
                    redirection: report.status_classes.redirection,
                    client_error: report.status_classes.client_error,
                    server_error: report.status_classes.server_error,
                    other: report.status_classes.other,
                },
                latencies: HistogramView::from(&report.latencies),
                latencies_2xx: report.latencies_2xx.as_ref().map(HistogramView::from),
                rps: HistogramView::from(&report.rps),
                errors: report
                    .errors_by_frequency
                    .iter()
                    .map(|(message, count)| ErrorFrequencyView {
                        message: message.clone(),
                        count: *count,
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "metric")]
    metric: String,
    #[tabled(rename = "value")]
    value: String,
}

fn histogram_rows(label: &str, stats: &HistogramView) -> Vec<MetricRow> {
    let mut rows = vec![
        MetricRow {
            metric: format!("{label} count"),
            value: stats.count.to_string(),
        },
        MetricRow {
            metric: format!("{label} mean"),
            value: format!("{:.2}", stats.mean),
        },
        MetricRow {
            metric: format!("{label} stddev"),
            value: format!("{:.2}", stats.stddev),
        },
        MetricRow {
            metric: format!("{label} max"),
            value: format!("{:.2}", stats.max),
        },
    ];
    for (p, v) in &stats.percentiles {
        rows.push(MetricRow {
            metric: format!("{label} p{p}"),
            value: format!("{:.2}", v),
        });
    }
    rows
}

#[derive(Tabled)]
struct StatusRow {
    class: String,
    count: u64,
}

#[derive(Tabled)]
struct ErrorRow {
    message: String,
    count: u64,
}

/// Render the default human-readable report: a statistics table per
/// histogram, status-class tallies, errors by frequency, and throughput.
pub fn render_plain_text(view: &ReportView, show_2xx_latencies: bool) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "target: {} [{}]\nconnections: {}  elapsed: {} ms  requests: {}\n\n",
        view.spec.target, view.spec.method, view.spec.connections, view.result.elapsed_ms, view.result.total_requests
    ));

    out.push_str("Latencies (microseconds)\n");
    out.push_str(&Table::new(histogram_rows("latency", &view.result.latencies)).to_string());
    out.push('\n');

    if show_2xx_latencies {
        if let Some(stats) = &view.result.latencies_2xx {
            out.push_str("\n2xx latencies (microseconds)\n");
            out.push_str(&Table::new(histogram_rows("2xx", stats)).to_string());
            out.push('\n');
        }
    }

    out.push_str("\nRequests per second\n");
    out.push_str(&Table::new(histogram_rows("rps", &view.result.rps)).to_string());
    out.push('\n');

    out.push_str("\nStatus classes\n");
    let status_rows = vec![
        StatusRow {
            class: "1xx".to_string(),
            count: view.result.status_classes.informational,
        },
        StatusRow {
            class: "2xx".to_string(),
            count: view.result.status_classes.success,
        },
        StatusRow {
            class: "3xx".to_string(),
            count: view.result.status_classes.redirection,
        },
        StatusRow {
            class: "4xx".to_string(),
            count: view.result.status_classes.client_error,
        },
        StatusRow {
            class: "5xx".to_string(),
            count: view.result.status_classes.server_error,
        },
        StatusRow {
            class: "other".to_string(),
            count: view.result.status_classes.other,
        },
    ];
    out.push_str(&Table::new(status_rows).to_string());
    out.push('\n');

    if !view.result.errors.is_empty() {
        out.push_str("\nErrors by frequency\n");
        let error_rows: Vec<ErrorRow> = view
            .result
            .errors
            .iter()
            .map(|e| ErrorRow {
                message: e.message.clone(),
                count: e.count,
            })
            .collect();
        out.push_str(&Table::new(error_rows).to_string());
        out.push('\n');
    }

    out.push_str(&format!(
        "\nThroughput: {} bytes read, {} bytes written\n",
        view.result.bytes_read, view.result.bytes_written
    ));

    out
}

pub fn render_json(view: &ReportView) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(view)?)
}

pub fn render_template(view: &ReportView, path: &Path) -> Result<String, OutputError> {
    let source = std::fs::read_to_string(path).map_err(|err| OutputError::TemplateFile(path.to_path_buf(), err))?;
    let mut engine = TinyTemplate::new();
    engine
        .add_template("report", &source)
        .map_err(|err| OutputError::TemplateRender(err.to_string()))?;
    engine.render("report", view).map_err(|err| OutputError::TemplateRender(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hammer_engine::config::{Method, TerminationPolicy};
    use hammer_engine::report::{aggregate_latency_histogram, aggregate_rps_histogram, StatusClassCounts};
    use hammer_engine::histogram::{Histogram, RpsHistogram};
    use std::time::Duration;

    fn sample_view() -> ReportView {
        let settings = Settings {
            target: "http://localhost/".to_string(),
            method: Method::Get,
            termination: TerminationPolicy::Requests(10),
            ..Settings::default()
        };
        let latencies = Histogram::with_defaults();
        latencies.increment(1_000);
        let rps = RpsHistogram::with_defaults();
        rps.record(50.0);
        let report = RunReport {
            bytes_read: 100,
            bytes_written: 50,
            elapsed: Duration::from_secs(1),
            status_classes: StatusClassCounts {
                success: 10,
                ..StatusClassCounts::default()
            },
            errors_by_frequency: vec![("connection reset".to_string(), 2)],
            latencies: aggregate_latency_histogram(&latencies, &[0.5]),
            latencies_2xx: Some(aggregate_latency_histogram(&latencies, &[0.5])),
            rps: aggregate_rps_histogram(&rps, &[0.5]),
        };
        ReportView::new(&settings, &report)
    }

    #[test]
    fn plain_text_includes_throughput_and_status_classes() {
        let view = sample_view();
        let text = render_plain_text(&view, true);
        assert!(text.contains("Throughput"));
        assert!(text.contains("2xx"));
        assert!(text.contains("connection reset"));
    }

    #[test]
    fn json_round_trips_total_requests() {
        let view = sample_view();
        let json = render_json(&view).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["result"]["total_requests"], 10);
    }

    #[test]
    fn template_substitutes_a_named_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.tpl");
        std::fs::write(&path, "requests={result.total_requests}").unwrap();
        let view = sample_view();
        let rendered = render_template(&view, &path).unwrap();
        assert_eq!(rendered, "requests=10");
    }
}
