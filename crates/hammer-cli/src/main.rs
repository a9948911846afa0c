//! `hammer`: a command-line HTTP(S) load generator.

mod cli;
mod logger;
mod output;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};

use hammer_client::{ClientError, FastClient, Http1Client, Http2Client, RequestSpec};
use hammer_engine::bytes::ByteCounters;
use hammer_engine::client::HttpClient;
use hammer_engine::config::{ClientVariant, OutputFormat, Settings};
use hammer_engine::progress::ProgressSink;
use hammer_engine::Engine;

use cli::{Cli, CliError, RunConfig};
use output::{render_json, render_plain_text, render_template, OutputError, ReportView};

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error(transparent)]
    Engine(#[from] hammer_engine::EngineError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Bridges the engine's `ProgressSink` trait to a terminal `indicatif` bar,
/// tracked in whole percentage points.
struct IndicatifProgress {
    bar: ProgressBar,
}

impl ProgressSink for IndicatifProgress {
    fn set_fraction(&self, fraction: f64) {
        let position = (fraction.clamp(0.0, 1.0) * 100.0).round() as u64;
        self.bar.set_position(position);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn build_client(settings: &Settings, byte_counters: ByteCounters) -> Result<Arc<dyn HttpClient>, ClientError> {
    let spec = RequestSpec::from_settings(settings)?;
    Ok(match settings.client_variant {
        ClientVariant::Http1 => Arc::new(Http1Client::new(spec, byte_counters)?),
        ClientVariant::Http2 => Arc::new(Http2Client::new(spec, byte_counters)?),
        // fasthttp-style transports are HTTP/1.1 only.
        ClientVariant::Fast => Arc::new(FastClient::new(spec, false, byte_counters)?),
    })
}

fn print_report(settings: &Settings, report: &hammer_engine::RunReport, show_2xx: bool, format: &OutputFormat) {
    let view = ReportView::new(settings, report);
    let rendered = match format {
        OutputFormat::PlainText => Ok(render_plain_text(&view, show_2xx)),
        OutputFormat::Json => render_json(&view).map_err(OutputError::from),
        OutputFormat::Template(path) => render_template(&view, path),
    };

    match rendered {
        Ok(text) => println!("{text}"),
        Err(err) => error!("{err}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logger::configure_logger();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let RunConfig { settings, show_2xx_latencies } = cli.into_run_config()?;

    let engine = Engine::new(settings)?;
    let lint = hammer_engine::config::lint(engine.settings());
    for warning in &lint.warnings {
        log::warn!("{warning}");
    }
    for recommendation in &lint.recommendations {
        info!("{recommendation}");
    }

    let print = engine.settings().print;
    if print.intro {
        let accent = Style::new().bold().cyan();
        println!(
            "{} {} connections, target {}",
            accent.apply_to("hammer"),
            engine.settings().connections,
            engine.settings().target
        );
    }

    let byte_counters = ByteCounters::new();
    let client = build_client(engine.settings(), byte_counters.clone())?;

    let progress_sink: Option<Arc<dyn ProgressSink>> = if print.progress {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}% ({elapsed})") {
            bar.set_style(style);
        }
        Some(Arc::new(IndicatifProgress { bar }))
    } else {
        None
    };

    let report = engine.run(client, byte_counters, progress_sink).await;

    if print.result {
        print_report(engine.settings(), &report, show_2xx_latencies, &engine.settings().format);
    }

    Ok(())
}
