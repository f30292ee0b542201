//! Byte-counting stream wrapper for archive uploads.

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::time::{Duration, Instant};

/// Called with `(bytes_sent, total_bytes)`
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Stream wrapper that counts bytes passed through and reports them
/// at most once per interval, plus once at end of stream.
pub struct ProgressStream<S> {
    inner: S,
    total_bytes: u64,
    bytes_sent: u64,
    last_update: Instant,
    update_interval: Duration,
    callback: ProgressCallback,
}

impl<S> ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    pub fn new(inner: S, total_bytes: u64, callback: ProgressCallback) -> Self {
        Self {
            inner,
            total_bytes,
            bytes_sent: 0,
            last_update: Instant::now(),
            update_interval: Duration::from_secs(1),
            callback,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
{
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.bytes_sent += chunk.len() as u64;

                let now = Instant::now();
                if now.duration_since(self.last_update) >= self.update_interval {
                    (self.callback)(self.bytes_sent, self.total_bytes);
                    self.last_update = now;
                }

                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                (self.callback)(self.bytes_sent, self.total_bytes);
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Percentage of `total` covered by `sent`, 100 for empty transfers.
pub fn percent(sent: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        ((sent as f64 / total as f64) * 100.0).min(100.0)
    }
}
