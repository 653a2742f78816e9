/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

use crate::io::crc64::SharedCrc64;
use crate::progress::{self, ByteTracker, ProgressEvent, ProgressEventKind, SharedProgressListener};

/// What a [`TeeReader`] or [`TeeStream`] observes as bytes flow through it
#[derive(Debug, Clone, Default)]
pub(crate) struct Observers {
    pub(crate) crc: Option<SharedCrc64>,
    pub(crate) tracker: ByteTracker,
    pub(crate) listener: Option<SharedProgressListener>,
    pub(crate) total: Option<u64>,
}

impl Observers {
    fn observe(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if let Some(crc) = &self.crc {
            crc.update(data);
        }
        let consumed = self.tracker.add(data.len() as u64);
        progress::publish(
            self.listener.as_ref(),
            ProgressEvent::new(
                ProgressEventKind::Data,
                consumed,
                self.total,
                data.len() as u64,
            ),
        );
    }
}

pin_project! {
    /// Reader updating a CRC64, a byte counter and a progress listener with every successful read
    pub(crate) struct TeeReader<R> {
        #[pin]
        inner: R,
        observers: Observers,
    }
}

impl<R> TeeReader<R> {
    pub(crate) fn new(inner: R, observers: Observers) -> Self {
        Self { inner, observers }
    }
}

impl<R: AsyncRead> AsyncRead for TeeReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        ready!(this.inner.poll_read(cx, buf))?;
        this.observers.observe(&buf.filled()[before..]);
        Poll::Ready(Ok(()))
    }
}

pin_project! {
    /// Stream counterpart of [`TeeReader`] for response bodies.
    ///
    /// Also reports the end of the transfer: `Completed` once the stream is exhausted or
    /// `Failed` on the first error.
    pub(crate) struct TeeStream<S> {
        #[pin]
        inner: S,
        observers: Observers,
        finished: bool,
    }
}

impl<S> TeeStream<S> {
    pub(crate) fn new(inner: S, observers: Observers) -> Self {
        Self {
            inner,
            observers,
            finished: false,
        }
    }
}

impl Observers {
    fn finish(&self, kind: ProgressEventKind) {
        progress::publish(
            self.listener.as_ref(),
            ProgressEvent::new(kind, self.tracker.get(), self.total, 0),
        );
    }
}

impl<S> Stream for TeeStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let item = ready!(this.inner.poll_next(cx));
        match &item {
            Some(Ok(chunk)) => this.observers.observe(chunk),
            Some(Err(_)) if !*this.finished => {
                *this.finished = true;
                this.observers.finish(ProgressEventKind::Failed);
            }
            None if !*this.finished => {
                *this.finished = true;
                this.observers.finish(ProgressEventKind::Completed);
            }
            _ => {}
        }
        Poll::Ready(item)
    }
}
