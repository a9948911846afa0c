//! A request description shared by all transport variants, built once at
//! client construction so `execute` never re-parses configuration.

use std::time::Duration;

use hammer_engine::config::{BodySource, ClientCert, Method, Settings};

use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stream: bool,
    pub timeout: Duration,
    pub insecure: bool,
    pub client_cert: Option<ClientCert>,
}

impl RequestSpec {
    /// Resolve `settings` into a request spec, reading a body file into
    /// memory once up front rather than on every request.
    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        let body = match &settings.body {
            BodySource::None => Vec::new(),
            BodySource::Bytes(bytes) => bytes.clone(),
            BodySource::File(path) => {
                std::fs::read(path).map_err(|err| ClientError::BodyFile(path.clone(), err))?
            }
        };

        Ok(Self {
            method: settings.method,
            url: settings.target.clone(),
            headers: settings.headers.clone(),
            body,
            stream: settings.stream,
            timeout: settings.timeout,
            insecure: settings.insecure,
            client_cert: settings.client_cert.clone(),
        })
    }
}
