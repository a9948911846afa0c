//! Exercises `FastClient` against a raw TCP loopback listener, capturing
//! the exact bytes it writes to the wire - this is the one transport that
//! claims byte-exact counting, so its tests read the request off a real
//! socket instead of trusting a higher-level client library to get it
//! right.

use std::time::Duration;

use hammer_client::{FastClient, RequestSpec};
use hammer_engine::bytes::ByteCounters;
use hammer_engine::client::HttpClient;
use hammer_engine::config::Method;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn spec(url: &str, headers: Vec<(String, String)>, body: Vec<u8>, stream: bool) -> RequestSpec {
    RequestSpec {
        method: if body.is_empty() { Method::Get } else { Method::Post },
        url: url.to_string(),
        headers,
        body,
        stream,
        timeout: Duration::from_secs(2),
        insecure: false,
        client_cert: None,
    }
}

/// Accepts one connection, reads until the client half-closes or a small
/// idle read returns nothing more, replies with a fixed small response,
/// and hands the raw request bytes back to the caller.
async fn capture_one_request(response: &'static str) -> (std::net::SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        // A loopback fast-path client keeps the connection open for reuse,
        // so read whatever arrives within a short window rather than
        // waiting for EOF.
        let _ = tokio::time::timeout(Duration::from_millis(200), async {
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend_from_slice(&buf[..n]),
                }
            }
        })
        .await;
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
        received
    });
    (addr, handle)
}

#[tokio::test]
async fn delivers_custom_headers_over_the_wire() {
    let (addr, server) = capture_one_request("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
    let url = format!("http://{addr}/probe");
    let headers = vec![("X-Hammer-Trace".to_string(), "abc123".to_string())];
    let client = FastClient::new(spec(&url, headers, Vec::new(), false), false, ByteCounters::new()).unwrap();

    let outcome = client.execute().await;
    assert_eq!(outcome.status, 200);

    let raw = server.await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.contains("x-hammer-trace: abc123"), "request was:\n{text}");
    assert!(text.starts_with("GET /probe"), "request was:\n{text}");
}

#[tokio::test]
async fn user_supplied_host_header_overrides_the_default_on_the_wire() {
    let (addr, server) = capture_one_request("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
    let url = format!("http://{addr}/probe");
    let headers = vec![("Host".to_string(), "override.test".to_string())];
    let client = FastClient::new(spec(&url, headers, Vec::new(), false), false, ByteCounters::new()).unwrap();

    let outcome = client.execute().await;
    assert_eq!(outcome.status, 200);

    let raw = server.await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    let host_lines: Vec<&str> = text.lines().filter(|line| line.to_ascii_lowercase().starts_with("host:")).collect();
    assert_eq!(host_lines, vec!["host: override.test"], "request was:\n{text}");
}

#[tokio::test]
async fn streaming_body_uses_chunked_transfer_encoding() {
    let (addr, server) = capture_one_request("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
    let url = format!("http://{addr}/upload");
    let client = FastClient::new(spec(&url, Vec::new(), b"payload".to_vec(), true), false, ByteCounters::new()).unwrap();

    let outcome = client.execute().await;
    assert_eq!(outcome.status, 200);

    let raw = server.await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.to_ascii_lowercase().contains("transfer-encoding: chunked"), "request was:\n{text}");
    assert!(!text.to_ascii_lowercase().contains("content-length"), "request was:\n{text}");
}

#[tokio::test]
async fn byte_counters_track_request_and_response_traffic() {
    let (addr, server) = capture_one_request("HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello").await;
    let url = format!("http://{addr}/");
    let byte_counters = ByteCounters::new();
    let client = FastClient::new(spec(&url, Vec::new(), Vec::new(), false), false, byte_counters.clone()).unwrap();

    let outcome = client.execute().await;
    assert_eq!(outcome.status, 200);
    let _ = server.await.unwrap();

    assert!(byte_counters.bytes_written() > 0);
    assert!(byte_counters.bytes_read() > 0);
}
