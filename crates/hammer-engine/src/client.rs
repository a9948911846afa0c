//! The engine's only view of an HTTP transport.
//!
//! The engine never constructs connections itself; it is handed something
//! implementing [`HttpClient`] and drives it in a tight loop. Concrete
//! transports (HTTP/1.1, HTTP/2, and a lean fast-path client) live in the
//! `hammer-client` crate.

use async_trait::async_trait;

/// The result of one request/response exchange.
///
/// `micros` is measured by the client from just before the request is
/// sent to just after the response body has been fully drained. On
/// transport failure or timeout, `status` is `-1` and `error` is set;
/// otherwise `status` carries the parsed HTTP status code and `error` is
/// `None`.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub status: i32,
    pub micros: u64,
    pub error: Option<String>,
}

impl RequestOutcome {
    pub fn is_error(&self) -> bool {
        self.status < 0
    }

    /// The status-class bucket this outcome routes into: one of
    /// `1xx`..`5xx`, or `other` for anything outside `100..=599` as well
    /// as the `-1` error sentinel.
    pub fn status_class(&self) -> StatusClass {
        match self.status {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
    Other,
}

/// A single, reusable request/response exchange against a preconfigured
/// URL/method/headers/body. Implementations are responsible for:
/// - honoring the configured request timeout,
/// - draining and closing the response body,
/// - updating the shared byte counters through their transport adapter,
/// - reusing connections up to a configured per-host maximum unless
///   keep-alive has been disabled.
///
/// Implementations must be safe to share across worker tasks (`Send +
/// Sync`) since every worker holds the same `Arc<dyn HttpClient>`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self) -> RequestOutcome;
}
