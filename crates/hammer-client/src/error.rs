//! Client-construction error kinds.
//!
//! These only ever surface during construction - body-file reads, TLS
//! material loading, client builds. Once a client is running, per-request
//! failures are reported through [`hammer_engine::client::RequestOutcome`]
//! instead, never as a `Result`.

use std::path::PathBuf;

use hammer_engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to read body file {0}: {1}")]
    BodyFile(PathBuf, std::io::Error),

    #[error("failed to read TLS material: {0}")]
    CertMaterial(#[from] std::io::Error),

    #[error("invalid client certificate or key: {0}")]
    InvalidCertMaterial(String),

    #[error("invalid target URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("failed to establish connection: {0}")]
    Dial(String),

    #[error("failed to build HTTP client: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl From<ClientError> for EngineError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::BodyFile(path, _) => EngineError::BodyFileUnavailable(path),
            ClientError::CertMaterial(_) | ClientError::InvalidCertMaterial(_) => {
                EngineError::TlsSetup(err.to_string())
            }
            ClientError::UrlParse(_) | ClientError::Dial(_) | ClientError::Reqwest(_) => {
                EngineError::TransportFailure(err.to_string())
            }
        }
    }
}
