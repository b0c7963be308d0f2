//! Streaming body wrapper that tracks metrics.

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::infra;

/// Type alias for boxed body stream.
pub type BoxedBodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, axum::Error>> + Send>>;

/// Passes upstream chunks through untouched, counting bytes and recording the
/// request duration once the stream finishes or fails.
pub struct ProxyBodyStream {
    inner: BoxedBodyStream,
    total_bytes: u64,
    start_time: Option<Instant>,
}

impl ProxyBodyStream {
    pub fn new(inner: BoxedBodyStream, start_time: Instant) -> Self {
        Self {
            inner,
            total_bytes: 0,
            start_time: Some(start_time),
        }
    }

    fn finish(&mut self) {
        if let Some(start) = self.start_time.take() {
            infra::metrics::HTTP_REQUEST_DURATION_SECONDS.observe(start.elapsed().as_secs_f64());
        }
    }
}

impl Stream for ProxyBodyStream {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let chunk_len = chunk.len() as u64;
                this.total_bytes = this.total_bytes.saturating_add(chunk_len);
                infra::metrics::BYTES_TRANSFERRED_TOTAL.inc_by(chunk_len);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                infra::metrics::record_error("body_stream");
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ProxyBodyStream {
    fn drop(&mut self) {
        // Client went away before the body finished.
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_chunks_pass_through_unchanged() {
        let chunks: Vec<Result<Bytes, axum::Error>> =
            vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))];
        let mut stream = ProxyBodyStream::new(
            Box::pin(futures_util::stream::iter(chunks)),
            Instant::now(),
        );

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"hello world");
        assert_eq!(stream.total_bytes, 11);
        assert!(stream.start_time.is_none());
    }
}
