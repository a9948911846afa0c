//! Byte-counting transport adapter.
//!
//! Wraps an inner async stream and tallies every byte that crosses it into
//! the shared [`ByteCounters`] handle, so the engine only ever sees two
//! atomic totals regardless of which transport produced them.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use hammer_engine::bytes::ByteCounters;

pub struct CountingStream<T> {
    inner: T,
    counters: ByteCounters,
}

impl<T> CountingStream<T> {
    pub fn new(inner: T, counters: ByteCounters) -> Self {
        Self { inner, counters }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for CountingStream<T> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if poll.is_ready() {
            let read = buf.filled().len().saturating_sub(before);
            if read > 0 {
                self.counters.add_read(read as i64);
            }
        }
        poll
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for CountingStream<T> {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = &poll {
            self.counters.add_written(*written as i64);
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn pair() -> (DuplexStream, DuplexStream) {
        tokio::io::duplex(64)
    }

    #[tokio::test]
    async fn tallies_bytes_written_and_read() {
        let (a, mut b) = pair();
        let counters = ByteCounters::new();
        let mut counted = CountingStream::new(a, counters.clone());

        counted.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(counters.bytes_written(), 5);

        b.write_all(b"world").await.unwrap();
        let mut readback = [0u8; 5];
        counted.read_exact(&mut readback).await.unwrap();
        assert_eq!(counters.bytes_read(), 5);
    }
}
