//! Minimal hyper-based fast-path transport.
//!
//! Bypasses `reqwest`'s higher-level body buffering: dials raw sockets by
//! hand (optionally through rustls), speaks HTTP/1.1 or HTTP/2 directly
//! over `hyper::client::conn`, and interposes [`CountingStream`] at the
//! exact socket boundary so byte accounting needs no approximation, unlike
//! the `reqwest`-backed transports.
//!
//! Connections are kept in a small free-list rather than handed to a full
//! connection-pooling client - minimal overhead was the point, and a
//! `Vec` behind a mutex is plenty for per-worker reuse.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::client::conn::{http1 as h1, http2 as h2};
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::TlsConnector;

use hammer_engine::bytes::ByteCounters;
use hammer_engine::client::{HttpClient, RequestOutcome};

use crate::counting::CountingStream;
use crate::error::ClientError;
use crate::spec::RequestSpec;
use crate::tls::build_client_config;

type Payload = BoxBody<Bytes, Infallible>;

enum Sender {
    Http1(h1::SendRequest<Payload>),
    Http2(h2::SendRequest<Payload>),
}

impl Sender {
    async fn send(&mut self, req: Request<Payload>) -> Result<hyper::Response<hyper::body::Incoming>, hyper::Error> {
        match self {
            Sender::Http1(sender) => sender.send_request(req).await,
            Sender::Http2(sender) => sender.send_request(req).await,
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            Sender::Http1(sender) => sender.is_closed(),
            Sender::Http2(sender) => sender.is_closed(),
        }
    }
}

pub struct FastClient {
    spec: RequestSpec,
    use_http2: bool,
    byte_counters: ByteCounters,
    tls_connector: Option<TlsConnector>,
    pool: Mutex<Vec<Sender>>,
}

impl FastClient {
    pub fn new(spec: RequestSpec, use_http2: bool, byte_counters: ByteCounters) -> Result<Self, ClientError> {
        let tls_connector = if spec.url.starts_with("https://") {
            let config = build_client_config(spec.insecure, spec.client_cert.as_ref())?;
            Some(TlsConnector::from(Arc::new(config)))
        } else {
            None
        };

        Ok(Self {
            spec,
            use_http2,
            byte_counters,
            tls_connector,
            pool: Mutex::new(Vec::new()),
        })
    }

    async fn take_connection(&self) -> Result<Sender, ClientError> {
        {
            let mut pool = self.pool.lock().await;
            while let Some(sender) = pool.pop() {
                if !sender.is_closed() {
                    return Ok(sender);
                }
            }
        }
        self.dial().await
    }

    async fn give_back(&self, sender: Sender) {
        self.pool.lock().await.push(sender);
    }

    async fn dial(&self) -> Result<Sender, ClientError> {
        let url = url::Url::parse(&self.spec.url)?;
        let host = url.host_str().ok_or_else(|| ClientError::Dial("target URL has no host".to_string()))?.to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ClientError::Dial("target URL has no resolvable port".to_string()))?;

        let tcp = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|err| ClientError::Dial(err.to_string()))?;
        let _ = tcp.set_nodelay(true);

        match &self.tls_connector {
            Some(connector) => {
                let server_name = ServerName::try_from(host)
                    .map_err(|err| ClientError::Dial(err.to_string()))?
                    .to_owned();
                let tls = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|err| ClientError::Dial(err.to_string()))?;
                let io = TokioIo::new(CountingStream::new(tls, self.byte_counters.clone()));
                self.handshake(io).await
            }
            None => {
                let io = TokioIo::new(CountingStream::new(tcp, self.byte_counters.clone()));
                self.handshake(io).await
            }
        }
    }

    async fn handshake<IO>(&self, io: IO) -> Result<Sender, ClientError>
    where
        IO: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    {
        if self.use_http2 {
            let (sender, connection) = h2::Builder::new(TokioExecutor::new())
                .handshake(io)
                .await
                .map_err(|err| ClientError::Dial(err.to_string()))?;
            tokio::spawn(async move {
                let _ = connection.await;
            });
            Ok(Sender::Http2(sender))
        } else {
            let (sender, connection) = h1::Builder::new()
                .handshake(io)
                .await
                .map_err(|err| ClientError::Dial(err.to_string()))?;
            tokio::spawn(async move {
                let _ = connection.await;
            });
            Ok(Sender::Http1(sender))
        }
    }
}

fn build_request(spec: &RequestSpec) -> Result<Request<Payload>, ClientError> {
    let url = url::Url::parse(&spec.url)?;
    let path_and_query = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    let mut builder = Request::builder().method(spec.method.as_str()).uri(path_and_query);

    let has_host_header = spec.headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("host"));
    if !has_host_header {
        builder = builder.header("Host", url.host_str().unwrap_or_default());
    }

    for (name, value) in &spec.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    // An unknown-size body (`StreamBody` over a single frame) forces
    // chunked transfer encoding on HTTP/1.1 instead of a Content-Length.
    let body: Payload = if spec.stream {
        let chunk = Bytes::from(spec.body.clone());
        let stream = futures_util::stream::once(async move { Ok(Frame::data(chunk)) });
        StreamBody::new(stream).boxed()
    } else {
        Full::new(Bytes::from(spec.body.clone())).boxed()
    };

    builder.body(body).map_err(|err| ClientError::Dial(err.to_string()))
}

#[async_trait]
impl HttpClient for FastClient {
    async fn execute(&self) -> RequestOutcome {
        let start = Instant::now();

        let request = match build_request(&self.spec) {
            Ok(request) => request,
            Err(err) => {
                return RequestOutcome {
                    status: -1,
                    micros: start.elapsed().as_micros() as u64,
                    error: Some(err.to_string()),
                }
            }
        };

        let mut sender = match self.take_connection().await {
            Ok(sender) => sender,
            Err(err) => {
                return RequestOutcome {
                    status: -1,
                    micros: start.elapsed().as_micros() as u64,
                    error: Some(err.to_string()),
                }
            }
        };

        let outcome = tokio::time::timeout(self.spec.timeout, async {
            let response = sender.send(request).await.map_err(|err| err.to_string())?;
            let status = response.status().as_u16() as i32;
            response.into_body().collect().await.map_err(|err| err.to_string())?;
            Ok::<i32, String>(status)
        })
        .await;

        match outcome {
            Ok(Ok(status)) => {
                if !sender.is_closed() {
                    self.give_back(sender).await;
                }
                RequestOutcome {
                    status,
                    micros: start.elapsed().as_micros() as u64,
                    error: None,
                }
            }
            Ok(Err(err)) => RequestOutcome {
                status: -1,
                micros: start.elapsed().as_micros() as u64,
                error: Some(err),
            },
            Err(_) => RequestOutcome {
                status: -1,
                micros: start.elapsed().as_micros() as u64,
                error: Some("operation timed out".to_string()),
            },
        }
    }
}
