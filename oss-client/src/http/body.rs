/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Sleep;
use tokio_util::io::{ReaderStream, StreamReader};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error;

/// Reader feeding a request body
pub type BoxReader = Pin<Box<dyn AsyncRead + Send + Sync + 'static>>;

/// Stream of body chunks
pub type BoxByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// Outgoing request body.
///
/// The body has already been run through the body pipeline (MD5, CRC64, progress and bandwidth
/// limiting) by the time a transport sees it, transports only have to move the bytes.
pub struct RequestBody {
    reader: Option<BoxReader>,
    content_length: Option<u64>,
}

impl RequestBody {
    /// A request without a body
    pub fn empty() -> Self {
        Self {
            reader: None,
            content_length: Some(0),
        }
    }

    /// Body read from `reader`. `content_length` is `None` when the length is unknown.
    pub fn from_reader(reader: BoxReader, content_length: Option<u64>) -> Self {
        Self {
            reader: Some(reader),
            content_length,
        }
    }

    /// Advertised length of the body
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Whether there is anything to send
    pub fn is_empty(&self) -> bool {
        self.reader.is_none()
    }

    /// Read the whole body into memory
    pub async fn collect(self) -> io::Result<Bytes> {
        match self.reader {
            None => Ok(Bytes::new()),
            Some(mut reader) => {
                let mut buf = Vec::with_capacity(self.content_length.unwrap_or(0) as usize);
                reader.read_to_end(&mut buf).await?;
                Ok(buf.into())
            }
        }
    }

    /// Convert the body into a stream of chunks. Each chunk must be produced within
    /// `read_timeout`.
    pub fn into_stream(self, read_timeout: Duration) -> Option<TimeoutStream<ReaderStream<BoxReader>>> {
        self.reader
            .map(|reader| TimeoutStream::new(ReaderStream::new(reader), read_timeout))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

impl From<Bytes> for RequestBody {
    fn from(value: Bytes) -> Self {
        let len = value.len() as u64;
        Self::from_reader(Box::pin(io::Cursor::new(value)), Some(len))
    }
}

/// Incoming response body
pub struct ResponseBody {
    inner: BoxByteStream,
}

impl ResponseBody {
    /// An empty body
    pub fn empty() -> Self {
        Self::from(Bytes::new())
    }

    /// Body backed by an arbitrary stream of chunks
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Pull the next chunk
    pub async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        self.inner.next().await
    }

    /// Read the remaining body into memory
    pub async fn collect(mut self) -> io::Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Adapt the body to an [`AsyncRead`]
    pub fn into_async_read(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(self.inner)
    }

    pub(crate) fn into_inner(self) -> BoxByteStream {
        self.inner
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}

impl From<Bytes> for ResponseBody {
    fn from(value: Bytes) -> Self {
        let chunk = if value.is_empty() {
            None
        } else {
            Some(Ok(value))
        };
        Self::from_stream(futures_util::stream::iter(chunk))
    }
}

impl Stream for ResponseBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

pin_project! {
    /// Stream adapter failing with [`io::ErrorKind::TimedOut`] when the inner stream does not
    /// produce an item within the configured duration.
    pub struct TimeoutStream<S> {
        #[pin]
        inner: S,
        timeout: Duration,
        sleep: Option<Pin<Box<Sleep>>>,
    }
}

impl<S> TimeoutStream<S> {
    pub(crate) fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            sleep: None,
        }
    }
}

impl<S> fmt::Debug for TimeoutStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutStream")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<S> Stream for TimeoutStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if let Poll::Ready(item) = this.inner.poll_next(cx) {
            *this.sleep = None;
            return Poll::Ready(item);
        }

        let timeout = *this.timeout;
        let sleep = this
            .sleep
            .get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
        ready!(sleep.as_mut().poll(cx));
        *this.sleep = None;
        Poll::Ready(Some(Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no data transferred within {timeout:?}"),
        ))))
    }
}

pin_project! {
    /// Stream adapter ending with an `OperationCancelled` error once the token is cancelled
    pub(crate) struct CancellableStream<S> {
        #[pin]
        inner: S,
        #[pin]
        cancelled: WaitForCancellationFutureOwned,
        done: bool,
    }
}

impl<S> CancellableStream<S> {
    pub(crate) fn new(inner: S, token: CancellationToken) -> Self {
        Self {
            inner,
            cancelled: token.cancelled_owned(),
            done: false,
        }
    }
}

impl<S> Stream for CancellableStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        if this.cancelled.poll(cx).is_ready() {
            *this.done = true;
            return Poll::Ready(Some(Err(io::Error::new(
                io::ErrorKind::Other,
                error::operation_cancelled(),
            ))));
        }
        this.inner.poll_next(cx)
    }
}
