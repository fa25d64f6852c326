//! Drives a single connection's response body to completion.
//!
//! Grounded in `original_source/twittytwister/streaming.py`'s `TwitterStream`: the body is read
//! chunk by chunk, each chunk resets an inactivity timer (default 60s, matching the Python
//! `timeoutPeriod` default), chunks are handed to [`crate::frame::FrameDecoder`], and each
//! complete datagram is decoded via [`crate::decode::decode_datagram`] and delivered to a
//! callback. The body is allowed to end as either a clean EOF or "potential data loss" (Twitter
//! closes the stream without a known `Content-Length`, which is the common case) -- both count
//! as [`CloseReason::Clean`]/[`CloseReason::PotentialDataLoss`] rather than an error.

use crate::decode::decode_datagram;
use crate::error::{CloseReason, Error};
use crate::frame::{Frame, FrameDecoder};
use crate::tweet::Status;
use bytes::Buf;
use http_body::Body;
use std::time::Duration;
use tokio::time::sleep;

/// How long to wait for data (including a keep-alive) before treating the connection as dead.
/// Twitter's own keep-alives arrive at least every 30 seconds, so 60 seconds leaves margin (the
/// original Twisted implementation uses the same default).
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Reads `body` to completion, calling `on_status` for each decoded Tweet.
///
/// Returns `Ok(reason)` if the body ended without a transport error (a clean EOF is
/// distinguished from a "potential data loss" EOF, but both are non-error outcomes here);
/// returns `Err` if
/// the body itself errored or the inactivity timeout elapsed.
pub async fn run_body<B, F>(mut body: B, timeout: Duration, mut on_status: F) -> Result<CloseReason, Error>
where
    B: Body + Unpin,
    B::Error: std::error::Error + Send + Sync + 'static,
    F: FnMut(Status),
{
    let mut frames = FrameDecoder::new();
    loop {
        let deadline = sleep(timeout);
        tokio::pin!(deadline);

        tokio::select! {
            biased;
            data = body_data(&mut body) => {
                match data {
                    Some(Ok(chunk)) => {
                        for frame in frames.feed(&chunk) {
                            match frame {
                                Frame::Datagram(bytes) => {
                                    if let Some(status) = decode_datagram(&bytes) {
                                        on_status(status);
                                    }
                                }
                                Frame::KeepAlive => {
                                    tracing::trace!("protocol: keep-alive received");
                                }
                            }
                        }
                    }
                    Some(Err(err)) => return Err(Error::transport(err)),
                    None => return Ok(CloseReason::PotentialDataLoss),
                }
            }
            _ = &mut deadline => {
                tracing::warn!(?timeout, "protocol: inactivity timeout elapsed");
                return Err(Error::TimedOut);
            }
        }
    }
}

async fn body_data<B>(body: &mut B) -> Option<Result<bytes::Bytes, B::Error>>
where
    B: Body + Unpin,
{
    use http_body::Body as _;
    std::future::poll_fn(|cx| std::pin::Pin::new(&mut *body).poll_data(cx)).await.map(|res| res.map(|mut buf| buf.copy_to_bytes(buf.remaining())))
}

/// Wraps a response body whose bytes are gzip-compressed, transparently inflating it. The
/// request advertises `Accept-Encoding: gzip`, so a conforming server may answer with one.
///
/// Bridges `http_body::Body` to `tokio::io::AsyncRead` via `tokio_util::io::StreamReader`
/// (`tokio-util/io` + `async-compression/tokio`), then feeds that through
/// `async_compression::tokio::bufread::GzipDecoder` and back out as a `Body` of plain chunks.
#[pin_project::pin_project]
pub struct GunzipBody<B> {
    #[pin]
    reader: async_compression::tokio::bufread::GzipDecoder<tokio_util::io::StreamReader<BodyAsStream<B>, bytes::Bytes>>,
}

impl<B> GunzipBody<B>
where
    B: Body + Unpin,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    pub fn new(body: B) -> Self {
        let stream = BodyAsStream { body };
        GunzipBody { reader: async_compression::tokio::bufread::GzipDecoder::new(tokio_util::io::StreamReader::new(stream)) }
    }
}

impl<B> Body for GunzipBody<B>
where
    B: Body + Unpin,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    type Data = bytes::Bytes;
    type Error = std::io::Error;

    fn poll_data(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Result<Self::Data, Self::Error>>> {
        use tokio::io::AsyncRead;

        let this = self.project();
        let mut buf = [0u8; 8192];
        let mut read_buf = tokio::io::ReadBuf::new(&mut buf);
        match this.reader.poll_read(cx, &mut read_buf) {
            std::task::Poll::Ready(Ok(())) => {
                let filled = read_buf.filled();
                if filled.is_empty() {
                    std::task::Poll::Ready(None)
                } else {
                    std::task::Poll::Ready(Some(Ok(bytes::Bytes::copy_from_slice(filled))))
                }
            }
            std::task::Poll::Ready(Err(err)) => std::task::Poll::Ready(Some(Err(err))),
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }

    fn poll_trailers(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<Option<http::HeaderMap>, Self::Error>> {
        std::task::Poll::Ready(Ok(None))
    }
}

/// Adapts an `http_body::Body` into the byte-`Stream` that `tokio_util::io::StreamReader` wants.
pub struct BodyAsStream<B> {
    body: B,
}

impl<B> futures_core::Stream for BodyAsStream<B>
where
    B: Body + Unpin,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    type Item = std::io::Result<bytes::Bytes>;

    fn poll_next(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match std::pin::Pin::new(&mut this.body).poll_data(cx) {
            std::task::Poll::Ready(Some(Ok(mut data))) => std::task::Poll::Ready(Some(Ok(data.copy_to_bytes(data.remaining())))),
            std::task::Poll::Ready(Some(Err(err))) => std::task::Poll::Ready(Some(Err(std::io::Error::new(std::io::ErrorKind::Other, err)))),
            std::task::Poll::Ready(None) => std::task::Poll::Ready(None),
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    struct ChunkedBody {
        chunks: VecDeque<Bytes>,
    }

    impl Body for ChunkedBody {
        type Data = Bytes;
        type Error = std::convert::Infallible;

        fn poll_data(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Self::Data, Self::Error>>> {
            Poll::Ready(self.chunks.pop_front().map(Ok))
        }

        fn poll_trailers(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<Option<http::HeaderMap>, Self::Error>> {
            Poll::Ready(Ok(None))
        }
    }

    #[tokio::test]
    async fn decodes_statuses_across_chunk_boundaries() {
        let body = ChunkedBody {
            chunks: VecDeque::from(vec![Bytes::from_static(b"13\r\n{\"id\":1,\"te"), Bytes::from_static(b"xt\":\"hi\"}")]),
        };
        let mut received = Vec::new();
        let result = run_body(body, Duration::from_secs(5), |status| received.push(status)).await.unwrap();
        assert_eq!(result, CloseReason::PotentialDataLoss);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn inactivity_timeout_fires_when_no_data_arrives() {
        struct NeverBody;
        impl Body for NeverBody {
            type Data = Bytes;
            type Error = std::convert::Infallible;
            fn poll_data(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Self::Data, Self::Error>>> {
                Poll::Pending
            }
            fn poll_trailers(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<Option<http::HeaderMap>, Self::Error>> {
                Poll::Ready(Ok(None))
            }
        }

        let handle = tokio::spawn(run_body(NeverBody, Duration::from_millis(100), |_: Status| {}));
        tokio::time::advance(Duration::from_millis(150)).await;
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::TimedOut)));
    }
}
