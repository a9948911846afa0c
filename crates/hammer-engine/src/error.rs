//! Engine-level error kinds.
//!
//! Configuration and setup errors abort construction before any request is
//! sent. Per-request errors (transport failures, timeouts) never surface
//! here; they are canonicalized and counted in the [`crate::error_map::ErrorMap`]
//! instead.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unsupported URL scheme: {0} (only http and https are accepted)")]
    UnsupportedScheme(String),

    #[error("unknown HTTP method: {0}")]
    UnknownHttpMethod(String),

    #[error("body file unavailable: {0}")]
    BodyFileUnavailable(PathBuf),

    #[error("TLS setup failed: {0}")]
    TlsSetup(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("request timed out")]
    Timeout,

    #[error("template render failed: {0}")]
    TemplateRender(String),
}
