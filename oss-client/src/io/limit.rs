/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;

use crate::runtime::token_bucket::TokenBucket;

// Pays for transferred bytes after the fact: the next read waits out any debt
#[derive(Debug)]
struct Pacer {
    bucket: Arc<TokenBucket>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Pacer {
    fn new(bucket: Arc<TokenBucket>) -> Self {
        Self {
            bucket,
            sleep: None,
        }
    }

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(sleep) = self.sleep.as_mut() {
            ready!(sleep.as_mut().poll(cx));
            self.sleep = None;
        }
        Poll::Ready(())
    }

    fn consumed(&mut self, n: usize) {
        let wait = self.bucket.consume(n as u64);
        if !wait.is_zero() {
            self.sleep = Some(Box::pin(tokio::time::sleep(wait)));
        }
    }
}

pin_project! {
    /// Reader limiting throughput to the rate of a shared token bucket
    #[derive(Debug)]
    pub(crate) struct LimitedReader<R> {
        #[pin]
        inner: R,
        pacer: Pacer,
    }
}

impl<R> LimitedReader<R> {
    pub(crate) fn new(inner: R, bucket: Arc<TokenBucket>) -> Self {
        Self {
            inner,
            pacer: Pacer::new(bucket),
        }
    }
}

impl<R: AsyncRead> AsyncRead for LimitedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        ready!(this.pacer.poll_ready(cx));
        let before = buf.filled().len();
        ready!(this.inner.poll_read(cx, buf))?;
        this.pacer.consumed(buf.filled().len() - before);
        Poll::Ready(Ok(()))
    }
}

pin_project! {
    /// Stream limiting throughput to the rate of a shared token bucket
    #[derive(Debug)]
    pub(crate) struct LimitedStream<S> {
        #[pin]
        inner: S,
        pacer: Pacer,
    }
}

impl<S> LimitedStream<S> {
    pub(crate) fn new(inner: S, bucket: Arc<TokenBucket>) -> Self {
        Self {
            inner,
            pacer: Pacer::new(bucket),
        }
    }
}

impl<S> Stream for LimitedStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        ready!(this.pacer.poll_ready(cx));
        let item = ready!(this.inner.poll_next(cx));
        if let Some(Ok(chunk)) = &item {
            this.pacer.consumed(chunk.len());
        }
        Poll::Ready(item)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::AsyncReadExt;

    use super::LimitedReader;
    use crate::runtime::token_bucket::TokenBucket;

    #[tokio::test(start_paused = true)]
    async fn test_limited_reader_paces() {
        // 1 KiB/s with a full one second burst allowance
        let bucket = Arc::new(TokenBucket::new(1024));
        let data = vec![1u8; 3 * 1024];
        let mut reader = LimitedReader::new(std::io::Cursor::new(data.clone()), bucket);

        let start = tokio::time::Instant::now();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(data, out);
        // the burst covers the first KiB, the rest has to be paid for
        assert!(start.elapsed() >= Duration::from_secs(1), "{:?}", start.elapsed());
    }
}
