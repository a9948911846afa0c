//! Validated run configuration.
//!
//! [`Settings`] is the engine's only view of what to run: everything here
//! is assumed already parsed (the CLI layer owns argument parsing, URL
//! normalization, and TLS material loading). [`Settings::validate`] is the
//! last line of defense - it rejects configurations that can't produce a
//! meaningful run before a single request is sent.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::EngineError;

/// Minimum accepted test duration; below this a duration-based run isn't
/// meaningful to report on.
pub const MIN_DURATION: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "PATCH" => Ok(Method::Patch),
            other => Err(EngineError::UnknownHttpMethod(other.to_string())),
        }
    }

    pub fn allows_body(&self) -> bool {
        !matches!(self, Method::Get | Method::Head)
    }
}

/// Either a fixed request count or a fixed wall-clock duration - never
/// both. Defaults to a 10 second duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPolicy {
    Requests(u64),
    Duration(Duration),
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        TerminationPolicy::Duration(Duration::from_secs(10))
    }
}

#[derive(Debug, Clone)]
pub enum BodySource {
    None,
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl Default for BodySource {
    fn default() -> Self {
        BodySource::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientVariant {
    Http1,
    Http2,
    Fast,
}

impl Default for ClientVariant {
    fn default() -> Self {
        ClientVariant::Http1
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PrintFlags {
    pub intro: bool,
    pub progress: bool,
    pub result: bool,
}

impl Default for PrintFlags {
    fn default() -> Self {
        Self {
            intro: true,
            progress: true,
            result: true,
        }
    }
}

impl PrintFlags {
    pub fn none() -> Self {
        Self {
            intro: false,
            progress: false,
            result: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum OutputFormat {
    PlainText,
    Json,
    Template(PathBuf),
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::PlainText
    }
}

/// A client certificate / private key pair - both required together.
#[derive(Debug, Clone)]
pub struct ClientCert {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub connections: u64,
    pub termination: TerminationPolicy,
    pub target: String,
    pub method: Method,
    pub body: BodySource,
    pub stream: bool,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub client_cert: Option<ClientCert>,
    pub insecure: bool,
    pub rate: Option<u64>,
    pub client_variant: ClientVariant,
    pub print: PrintFlags,
    pub format: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connections: 125,
            termination: TerminationPolicy::default(),
            target: String::new(),
            method: Method::Get,
            body: BodySource::default(),
            stream: false,
            headers: Vec::new(),
            timeout: Duration::from_secs(2),
            client_cert: None,
            insecure: false,
            rate: None,
            client_variant: ClientVariant::default(),
            print: PrintFlags::default(),
            format: OutputFormat::default(),
        }
    }
}

impl Settings {
    /// Reject the hard configuration failures: zero connections, a
    /// sub-1s duration, a body on a method that disallows one, a client
    /// cert without its key (or vice versa), a zero rate, and an
    /// unsupported URL scheme.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.connections == 0 {
            return Err(EngineError::InvalidConfiguration(
                "connections must be greater than zero".to_string(),
            ));
        }

        if let TerminationPolicy::Requests(n) = self.termination {
            if n == 0 {
                return Err(EngineError::InvalidConfiguration(
                    "number of requests must be greater than zero".to_string(),
                ));
            }
        }
        if let TerminationPolicy::Duration(d) = self.termination {
            if d < MIN_DURATION {
                return Err(EngineError::InvalidConfiguration(
                    "duration must be at least 1s".to_string(),
                ));
            }
        }

        if !matches!(self.body, BodySource::None) && !self.method.allows_body() {
            return Err(EngineError::InvalidConfiguration(format!(
                "{} requests cannot have a body",
                self.method.as_str()
            )));
        }

        if let BodySource::File(path) = &self.body {
            if !path.exists() {
                return Err(EngineError::BodyFileUnavailable(path.clone()));
            }
        }

        if let Some(rate) = self.rate {
            if rate == 0 {
                return Err(EngineError::InvalidConfiguration(
                    "rate can't be less than 1".to_string(),
                ));
            }
        }

        if !(self.target.starts_with("http://") || self.target.starts_with("https://")) {
            let scheme = self.target.split("://").next().unwrap_or(&self.target);
            return Err(EngineError::UnsupportedScheme(scheme.to_string()));
        }

        Ok(())
    }
}

/// Soft validation feedback: warnings and recommendations that do not
/// block the run, collected separately from the hard failures in
/// [`Settings::validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn add_recommendation(&mut self, recommendation: impl Into<String>) {
        self.recommendations.push(recommendation.into());
    }
}

/// Non-blocking advice about a configuration that already passed
/// [`Settings::validate`] - e.g. running rate-limited without a
/// latencies histogram loses detail that's cheap to keep.
pub fn lint(settings: &Settings) -> ValidationResult {
    let mut result = ValidationResult::default();

    if settings.rate.is_some() && matches!(settings.termination, TerminationPolicy::Requests(_)) {
        result.add_recommendation(
            "rate limiting combined with a fixed request count makes wall-clock duration the \
             effective stop condition; consider --duration instead"
                .to_string(),
        );
    }

    if settings.insecure {
        result.add_warning("TLS certificate verification is disabled (--insecure)".to_string());
    }

    if settings.timeout > Duration::from_secs(60) {
        result.add_recommendation(
            "request timeout is unusually high; slow requests will block a worker for a long time"
                .to_string(),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings {
            target: "http://localhost:8080/".to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn rejects_zero_connections() {
        let settings = Settings {
            connections: 0,
            ..valid_settings()
        };
        assert!(matches!(
            settings.validate(),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_sub_second_duration() {
        let settings = Settings {
            termination: TerminationPolicy::Duration(Duration::from_millis(500)),
            ..valid_settings()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_requests() {
        let settings = Settings {
            termination: TerminationPolicy::Requests(0),
            ..valid_settings()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_body_on_head() {
        let settings = Settings {
            method: Method::Head,
            body: BodySource::Bytes(b"x".to_vec()),
            ..valid_settings()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_rate() {
        let settings = Settings {
            rate: Some(0),
            ..valid_settings()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_non_http_scheme() {
        let settings = Settings {
            target: "ftp://localhost/".to_string(),
            ..valid_settings()
        };
        assert!(matches!(
            settings.validate(),
            Err(EngineError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn accepts_a_valid_configuration() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn lints_insecure_without_failing_validation() {
        let settings = Settings {
            insecure: true,
            ..valid_settings()
        };
        assert!(settings.validate().is_ok());
        let result = lint(&settings);
        assert!(!result.warnings.is_empty());
    }
}
