//! Argument parsing and `Settings` assembly.
//!
//! `clap` owns argument syntax and flag conflicts; everything it can't
//! express (print-spec tokens, the `path:FILE` format prefix, header
//! splitting, URL normalization) is resolved here, once, before
//! [`hammer_engine::Engine`] ever sees a [`Settings`].

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use hammer_engine::config::{BodySource, ClientCert, ClientVariant, Method, OutputFormat, PrintFlags, Settings};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid target URL {0:?}")]
    InvalidUrl(String),

    #[error("invalid header {0:?}: expected \"Name: Value\"")]
    InvalidHeader(String),

    #[error("invalid --print spec {0:?}: expected tokens from i,p,r or intro,progress,result")]
    InvalidPrintSpec(String),

    #[error("invalid --format {0:?}: expected plain-text, pt, json, j, or path:FILE")]
    InvalidFormat(String),

    #[error("--cert and --key must be given together")]
    PartialClientCert,

    #[error(transparent)]
    Engine(#[from] hammer_engine::EngineError),
}

#[derive(Debug, Parser)]
#[command(name = "hammer", version, about = "An HTTP(S) load generator")]
pub struct Cli {
    /// Number of concurrent connections (workers).
    #[arg(short = 'c', long, default_value_t = 125)]
    pub connections: u64,

    /// Total number of requests to issue.
    #[arg(short = 'n', long = "requests", conflicts_with = "duration")]
    pub requests: Option<u64>,

    /// Total wall-clock duration to run for (e.g. "10s", "1m30s").
    #[arg(short = 'd', long = "duration", value_parser = humantime::parse_duration, conflicts_with = "requests")]
    pub duration: Option<Duration>,

    /// Per-request timeout.
    #[arg(short = 't', long = "timeout", value_parser = humantime::parse_duration, default_value = "2s")]
    pub timeout: Duration,

    /// Target requests per second, paced across all connections.
    #[arg(short = 'r', long = "rate")]
    pub rate: Option<u64>,

    /// Also report a latency breakdown restricted to 2xx responses.
    #[arg(short = 'l', long = "latencies")]
    pub latencies: bool,

    /// HTTP method.
    #[arg(short = 'm', long = "method", default_value = "GET")]
    pub method: String,

    /// Request body, given literally.
    #[arg(short = 'b', long = "body", conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Request body, read from a file.
    #[arg(short = 'f', long = "body-file", conflicts_with = "body")]
    pub body_file: Option<PathBuf>,

    /// Send the body with chunked transfer encoding instead of Content-Length.
    #[arg(short = 's', long = "stream")]
    pub stream: bool,

    /// Client certificate (PEM). Requires --key.
    #[arg(long = "cert", requires = "key")]
    pub cert: Option<PathBuf>,

    /// Client private key (PEM). Requires --cert.
    #[arg(long = "key", requires = "cert")]
    pub key: Option<PathBuf>,

    /// Skip TLS certificate verification.
    #[arg(short = 'k', long = "insecure")]
    pub insecure: bool,

    /// Extra request header "Name: Value", repeatable.
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Use the lean hyper-based fast-path transport.
    #[arg(long = "fasthttp", group = "client_variant")]
    pub fasthttp: bool,

    /// Force HTTP/1.1.
    #[arg(long = "http1", group = "client_variant")]
    pub http1: bool,

    /// Force HTTP/2.
    #[arg(long = "http2", group = "client_variant")]
    pub http2: bool,

    /// What to print: comma-separated i(ntro), p(rogress), r(esult).
    #[arg(short = 'p', long = "print", conflicts_with = "no_print")]
    pub print: Option<String>,

    /// Suppress intro/progress/result printing.
    #[arg(short = 'q', long = "no-print", conflicts_with = "print")]
    pub no_print: bool,

    /// Output format: plain-text, pt, json, j, or path:FILE.
    #[arg(short = 'o', long = "format", default_value = "plain-text")]
    pub format: String,

    /// Target URL. Accepts hostless/schemeless forms.
    pub target: String,
}

/// Everything derived from the parsed arguments that isn't part of
/// `Settings` itself.
pub struct RunConfig {
    pub settings: Settings,
    pub show_2xx_latencies: bool,
}

impl Cli {
    pub fn into_run_config(self) -> Result<RunConfig, CliError> {
        let target = normalize_url(&self.target)?;
        let method = Method::parse(&self.method)?;

        let termination = match (self.requests, self.duration) {
            (Some(n), None) => hammer_engine::config::TerminationPolicy::Requests(n),
            (None, Some(d)) => hammer_engine::config::TerminationPolicy::Duration(d),
            (None, None) => hammer_engine::config::TerminationPolicy::default(),
            (Some(_), Some(_)) => unreachable!("clap rejects --requests with --duration"),
        };

        let body = match (self.body, self.body_file) {
            (Some(literal), None) => BodySource::Bytes(literal.into_bytes()),
            (None, Some(path)) => BodySource::File(path),
            (None, None) => BodySource::None,
            (Some(_), Some(_)) => unreachable!("clap rejects --body with --body-file"),
        };

        let client_cert = match (self.cert, self.key) {
            (Some(cert), Some(key)) => Some(ClientCert { cert, key }),
            (None, None) => None,
            _ => return Err(CliError::PartialClientCert),
        };

        let mut headers = Vec::with_capacity(self.headers.len());
        for raw in &self.headers {
            headers.push(parse_header(raw)?);
        }

        let print = if self.no_print {
            PrintFlags::none()
        } else if let Some(spec) = &self.print {
            parse_print_spec(spec)?
        } else {
            PrintFlags::default()
        };

        let format = parse_format(&self.format)?;

        let client_variant = if self.fasthttp || (!self.http1 && !self.http2) {
            ClientVariant::Fast
        } else if self.http2 {
            ClientVariant::Http2
        } else {
            ClientVariant::Http1
        };

        let settings = Settings {
            connections: self.connections,
            termination,
            target,
            method,
            body,
            stream: self.stream,
            headers,
            timeout: self.timeout,
            client_cert,
            insecure: self.insecure,
            rate: self.rate,
            client_variant,
            print,
            format,
        };

        Ok(RunConfig {
            settings,
            show_2xx_latencies: self.latencies,
        })
    }
}

/// Accept hostless/schemeless targets: no scheme implies `http://`; a
/// missing host defaults to `localhost`. Port defaulting per scheme is
/// left to the transport (neither `reqwest` nor `hyper` need an explicit
/// `:80`/`:443`).
fn normalize_url(raw: &str) -> Result<String, CliError> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else if raw.starts_with(':') || raw.starts_with('/') {
        format!("http://localhost{raw}")
    } else {
        format!("http://{raw}")
    };

    let mut url = url::Url::parse(&with_scheme).map_err(|_| CliError::InvalidUrl(raw.to_string()))?;
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        url.set_host(Some("localhost")).map_err(|_| CliError::InvalidUrl(raw.to_string()))?;
    }
    Ok(url.to_string())
}

fn parse_header(raw: &str) -> Result<(String, String), CliError> {
    let (name, value) = raw.split_once(':').ok_or_else(|| CliError::InvalidHeader(raw.to_string()))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_print_spec(raw: &str) -> Result<PrintFlags, CliError> {
    let mut print = PrintFlags {
        intro: false,
        progress: false,
        result: false,
    };
    for token in raw.split(',') {
        let token = token.trim().to_ascii_lowercase();
        if token.is_empty() {
            continue;
        }
        match token.as_str() {
            "i" | "intro" => print.intro = true,
            "p" | "progress" => print.progress = true,
            "r" | "result" => print.result = true,
            _ => return Err(CliError::InvalidPrintSpec(token)),
        }
    }
    Ok(print)
}

fn parse_format(raw: &str) -> Result<OutputFormat, CliError> {
    match raw {
        "plain-text" | "pt" => Ok(OutputFormat::PlainText),
        "json" | "j" => Ok(OutputFormat::Json),
        other => other
            .strip_prefix("path:")
            .map(|path| OutputFormat::Template(PathBuf::from(path)))
            .ok_or_else(|| CliError::InvalidFormat(other.to_string())),
    }
}
