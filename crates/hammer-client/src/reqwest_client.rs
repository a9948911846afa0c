//! `reqwest`-backed transports.
//!
//! Both variants share construction: a `reqwest::Client` built once,
//! forced onto the desired HTTP version, with TLS verification and
//! client-cert material wired from the request spec. `reqwest` has no
//! dialer hook to interpose a byte-counting layer at the socket boundary
//! (that's what `FastClient` is for), so these two approximate: bytes
//! written count the request line, headers, and body; bytes read count
//! the status line, response headers, and the body actually drained.

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Body, Client, Identity, Method as ReqwestMethod};

use hammer_engine::bytes::ByteCounters;
use hammer_engine::client::{HttpClient, RequestOutcome};
use hammer_engine::config::Method;

use crate::error::ClientError;
use crate::spec::RequestSpec;

fn to_reqwest_method(method: Method) -> ReqwestMethod {
    match method {
        Method::Get => ReqwestMethod::GET,
        Method::Post => ReqwestMethod::POST,
        Method::Put => ReqwestMethod::PUT,
        Method::Delete => ReqwestMethod::DELETE,
        Method::Head => ReqwestMethod::HEAD,
        Method::Options => ReqwestMethod::OPTIONS,
        Method::Patch => ReqwestMethod::PATCH,
    }
}

fn build_headers(spec: &RequestSpec) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(spec.headers.len());
    for (name, value) in &spec.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.append(name, value);
        }
    }
    headers
}

fn identity_from_cert(spec: &RequestSpec) -> Result<Option<Identity>, ClientError> {
    let Some(pair) = &spec.client_cert else {
        return Ok(None);
    };
    let mut pem = std::fs::read(&pair.cert).map_err(|err| ClientError::BodyFile(pair.cert.clone(), err))?;
    let mut key_pem = std::fs::read(&pair.key).map_err(|err| ClientError::BodyFile(pair.key.clone(), err))?;
    pem.append(&mut key_pem);
    Ok(Some(Identity::from_pem(&pem)?))
}

enum HttpVersion {
    Http1,
    /// ALPN-negotiated over TLS; prior-knowledge cleartext over plain HTTP
    /// (reqwest has no "ALPN but cleartext" option, so cleartext HTTP/2
    /// must commit to prior knowledge up front).
    Http2 { cleartext: bool },
}

fn build_client(spec: &RequestSpec, version: HttpVersion) -> Result<Client, ClientError> {
    let mut builder = Client::builder()
        .timeout(spec.timeout)
        .danger_accept_invalid_certs(spec.insecure)
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(usize::MAX);

    builder = match version {
        HttpVersion::Http1 => builder.http1_only(),
        HttpVersion::Http2 { cleartext: true } => builder.http2_prior_knowledge(),
        HttpVersion::Http2 { cleartext: false } => builder,
    };

    if let Some(identity) = identity_from_cert(spec)? {
        builder = builder.identity(identity);
    }

    Ok(builder.build()?)
}

/// Estimate the on-wire size of the outgoing request. Approximate by
/// design - see the module doc.
fn request_size(spec: &RequestSpec, headers: &HeaderMap) -> i64 {
    let request_line = spec.method.as_str().len() + spec.url.len() + 12; // "METHOD URL HTTP/1.1\r\n"
    let header_bytes: usize = headers
        .iter()
        .map(|(name, value)| name.as_str().len() + value.len() + 4) // "Name: value\r\n"
        .sum();
    (request_line + header_bytes + spec.body.len()) as i64
}

/// Build the outgoing body. A `--stream` request is wrapped in a
/// single-chunk stream so reqwest has no known length to advertise and
/// falls back to `Transfer-Encoding: chunked`; otherwise the body goes
/// out as a plain buffer with a `Content-Length`.
fn build_body(spec: &RequestSpec) -> Body {
    if spec.stream {
        let chunk = Bytes::from(spec.body.clone());
        let stream = futures_util::stream::once(async move { Ok::<_, std::io::Error>(chunk) });
        Body::wrap_stream(stream)
    } else {
        Body::from(spec.body.clone())
    }
}

async fn execute_with(client: &Client, spec: &RequestSpec, byte_counters: &ByteCounters) -> RequestOutcome {
    let start = Instant::now();
    let headers = build_headers(spec);
    byte_counters.add_written(request_size(spec, &headers));

    let mut request = client.request(to_reqwest_method(spec.method), &spec.url).headers(headers);
    if !spec.body.is_empty() {
        request = request.body(build_body(spec));
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status().as_u16() as i32;
            let response_headers_len: usize = response
                .headers()
                .iter()
                .map(|(name, value)| name.as_str().len() + value.len() + 4)
                .sum();
            match response.bytes().await {
                Ok(body) => {
                    byte_counters.add_read((response_headers_len + body.len() + 15) as i64);
                    RequestOutcome {
                        status,
                        micros: start.elapsed().as_micros() as u64,
                        error: None,
                    }
                }
                Err(err) => RequestOutcome {
                    status: -1,
                    micros: start.elapsed().as_micros() as u64,
                    error: Some(err.to_string()),
                },
            }
        }
        Err(err) => {
            let error = if err.is_timeout() {
                "operation timed out".to_string()
            } else {
                err.to_string()
            };
            RequestOutcome {
                status: -1,
                micros: start.elapsed().as_micros() as u64,
                error: Some(error),
            }
        }
    }
}

/// HTTP/1.1-only transport, one connection pool per instance.
pub struct Http1Client {
    client: Client,
    spec: RequestSpec,
    byte_counters: ByteCounters,
}

impl Http1Client {
    pub fn new(spec: RequestSpec, byte_counters: ByteCounters) -> Result<Self, ClientError> {
        let client = build_client(&spec, HttpVersion::Http1)?;
        Ok(Self { client, spec, byte_counters })
    }
}

#[async_trait]
impl HttpClient for Http1Client {
    async fn execute(&self) -> RequestOutcome {
        execute_with(&self.client, &self.spec, &self.byte_counters).await
    }
}

/// HTTP/2 transport: ALPN-negotiated over TLS, prior-knowledge cleartext
/// over plain HTTP.
pub struct Http2Client {
    client: Client,
    spec: RequestSpec,
    byte_counters: ByteCounters,
}

impl Http2Client {
    pub fn new(spec: RequestSpec, byte_counters: ByteCounters) -> Result<Self, ClientError> {
        let cleartext = spec.url.starts_with("http://");
        let client = build_client(&spec, HttpVersion::Http2 { cleartext })?;
        Ok(Self { client, spec, byte_counters })
    }
}

#[async_trait]
impl HttpClient for Http2Client {
    async fn execute(&self) -> RequestOutcome {
        execute_with(&self.client, &self.spec, &self.byte_counters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn spec(url: &str) -> RequestSpec {
        RequestSpec {
            method: Method::Get,
            url: url.to_string(),
            headers: vec![("X-Tag".to_string(), "alpha".to_string())],
            body: Vec::new(),
            stream: false,
            timeout: StdDuration::from_secs(2),
            insecure: false,
            client_cert: None,
        }
    }

    #[test]
    fn builds_http1_client_for_plain_http() {
        assert!(Http1Client::new(spec("http://127.0.0.1:1/"), ByteCounters::new()).is_ok());
    }

    #[test]
    fn builds_http2_client_for_plain_http() {
        assert!(Http2Client::new(spec("http://127.0.0.1:1/"), ByteCounters::new()).is_ok());
    }

    #[test]
    fn builds_http2_client_for_https_without_prior_knowledge() {
        // Over TLS, HTTP/2 is ALPN-negotiated - there's no prior-knowledge
        // mode to force, so this must not fall through to http1_only().
        assert!(Http2Client::new(spec("https://127.0.0.1:1/"), ByteCounters::new()).is_ok());
    }

    #[test]
    fn request_size_accounts_for_headers_and_body() {
        let mut s = spec("http://127.0.0.1:1/");
        s.body = b"abracadabra".to_vec();
        let headers = build_headers(&s);
        assert!(request_size(&s, &headers) as usize > s.body.len());
    }
}
