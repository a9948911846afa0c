//! Exercises `Http1Client` against a raw TCP loopback listener to confirm
//! `--stream` actually changes what goes out on the wire, not just what
//! `hammer-client`'s own types say it should do.

use std::time::Duration;

use hammer_client::{Http1Client, RequestSpec};
use hammer_engine::bytes::ByteCounters;
use hammer_engine::client::HttpClient;
use hammer_engine::config::Method;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn spec(url: &str, body: Vec<u8>, stream: bool) -> RequestSpec {
    RequestSpec {
        method: Method::Post,
        url: url.to_string(),
        headers: Vec::new(),
        body,
        stream,
        timeout: Duration::from_secs(2),
        insecure: false,
        client_cert: None,
    }
}

async fn capture_one_request(response: &'static str) -> (std::net::SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
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
async fn streaming_body_uses_chunked_transfer_encoding() {
    let (addr, server) = capture_one_request("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
    let url = format!("http://{addr}/upload");
    let client = Http1Client::new(spec(&url, b"payload".to_vec(), true), ByteCounters::new()).unwrap();

    let outcome = client.execute().await;
    assert_eq!(outcome.status, 200);

    let raw = server.await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.to_ascii_lowercase().contains("transfer-encoding: chunked"), "request was:\n{text}");
    assert!(!text.to_ascii_lowercase().contains("content-length"), "request was:\n{text}");
}

#[tokio::test]
async fn non_streaming_body_uses_content_length() {
    let (addr, server) = capture_one_request("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
    let url = format!("http://{addr}/upload");
    let client = Http1Client::new(spec(&url, b"payload".to_vec(), false), ByteCounters::new()).unwrap();

    let outcome = client.execute().await;
    assert_eq!(outcome.status, 200);

    let raw = server.await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.to_ascii_lowercase().contains("content-length: 7"), "request was:\n{text}");
    assert!(!text.to_ascii_lowercase().contains("transfer-encoding"), "request was:\n{text}");
}
