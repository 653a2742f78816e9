/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use pin_project_lite::pin_project;
use tokio::sync::watch;

use crate::config::{Config, HttpTimeout};
use crate::error::{self, BoxError, Error};

pub(crate) mod header;

/// Request and response bodies exchanged with an [`HttpTransport`]
pub mod body;

pub use self::body::{RequestBody, ResponseBody};

/// Sends fully signed requests over the wire.
///
/// The request engine owns signing, body transformation and response classification.
/// Implementations are only responsible for connection management and for moving bytes.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Dispatch `request` and return the response once its headers have arrived
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> Result<http::Response<ResponseBody>, BoxError>;
}

/// Shared, type erased transport
pub type SharedHttpTransport = Arc<dyn HttpTransport>;

/// The default transport used by a client when not explicitly configured.
pub(crate) fn default_transport(config: &Config) -> Result<SharedHttpTransport, Error> {
    Ok(Arc::new(ReqwestTransport::new(config)?))
}

/// [`HttpTransport`] backed by a pooled `reqwest` client
#[derive(Debug, Clone)]
pub(crate) struct ReqwestTransport {
    client: reqwest::Client,
    timeout: HttpTimeout,
}

impl ReqwestTransport {
    pub(crate) fn new(config: &Config) -> Result<Self, Error> {
        let timeout = config.timeout().clone();
        let mut builder = reqwest::Client::builder()
            .connect_timeout(timeout.connect)
            .pool_idle_timeout(timeout.idle_conn)
            .pool_max_idle_per_host(config.max_idle_conns_per_host())
            .danger_accept_invalid_certs(config.insecure_skip_verify())
            .local_address(config.local_address());

        if !config.redirect_enabled() {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }

        if let Some(proxy) = config.proxy() {
            let mut p = reqwest::Proxy::all(proxy.host()).map_err(error::invalid_input)?;
            if let (Some(user), Some(password)) = (&proxy.user, &proxy.password) {
                p = p.basic_auth(user, password);
            }
            builder = builder.proxy(p);
        } else {
            // only the configured proxy applies, not the system settings
            builder = builder.no_proxy();
        }

        let client = builder.build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> Result<http::Response<ResponseBody>, BoxError> {
        let (parts, body) = request.into_parts();
        let url = reqwest::Url::parse(&parts.uri.to_string())?;
        let mut req = reqwest::Request::new(parts.method, url);
        *req.headers_mut() = parts.headers;

        // the body resets the idle deadline with every chunk, once it is sent the response
        // headers are due within the header timeout
        let (progress_tx, progress_rx) = watch::channel(false);
        match body.into_stream(self.timeout.read_write) {
            Some(stream) => {
                let stream = ReportProgress::new(stream, progress_tx);
                *req.body_mut() = Some(reqwest::Body::wrap_stream(stream));
            }
            None => {
                progress_tx.send_replace(true);
            }
        }

        let deadline = request_deadline(progress_rx, self.timeout.long, self.timeout.header);
        let resp = tokio::select! {
            resp = self.client.execute(req) => resp?,
            err = deadline => return Err(err),
        };

        let mut builder = http::Response::builder().status(resp.status());
        if let Some(headers) = builder.headers_mut() {
            *headers = resp.headers().clone();
        }
        let stream = resp
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let body = ResponseBody::from_stream(body::TimeoutStream::new(
            stream,
            self.timeout.read_write,
        ));
        Ok(builder.body(body)?)
    }
}

fn timeout_error(what: &str, after: Duration) -> BoxError {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("{what} timed out after {after:?}"),
    )
    .into()
}

/// Resolves once the request stalls: no body progress within `idle` while the body is sent, or
/// no response headers within `header` after it.
async fn request_deadline(
    mut progress: watch::Receiver<bool>,
    idle: Duration,
    header: Duration,
) -> BoxError {
    loop {
        if *progress.borrow_and_update() {
            break;
        }
        match tokio::time::timeout(idle, progress.changed()).await {
            Err(_) => return timeout_error("request body", idle),
            // the body stream went away, the send future resolves first
            Ok(Err(_)) => break,
            Ok(Ok(())) => {}
        }
    }
    tokio::time::sleep(header).await;
    timeout_error("response headers", header)
}

pin_project! {
    // Signals `progress` for every chunk of the wrapped body stream and marks it done at the end
    struct ReportProgress<S> {
        #[pin]
        inner: S,
        progress: watch::Sender<bool>,
    }
}

impl<S> ReportProgress<S> {
    fn new(inner: S, progress: watch::Sender<bool>) -> Self {
        Self { inner, progress }
    }
}

impl<S> Stream for ReportProgress<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let item = futures_util::ready!(this.inner.poll_next(cx));
        match &item {
            Some(Ok(_)) => this.progress.send_modify(|_| {}),
            None | Some(Err(_)) => {
                this.progress.send_replace(true);
            }
        }
        Poll::Ready(item)
    }
}

#[cfg(test)]
mod test {
    use std::future::Future;
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{ready, Context, Poll};
    use std::time::Duration;

    use bytes::Bytes;
    use futures_util::StreamExt;
    use http::header::CONTENT_LENGTH;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};
    use tokio::net::TcpListener;
    use tokio::sync::watch;
    use tokio::time::{Instant, Sleep};

    use super::{request_deadline, HttpTransport, ReportProgress, ReqwestTransport};
    use crate::config::{Config, HttpTimeout};
    use crate::credentials::Credentials;
    use crate::http::RequestBody;

    #[tokio::test]
    async fn test_report_progress() {
        let (tx, mut rx) = watch::channel(false);
        let chunks = vec![Ok(Bytes::from_static(b"a")), Ok(Bytes::from_static(b"b"))];
        let mut stream = ReportProgress::new(futures_util::stream::iter(chunks), tx);

        assert!(stream.next().await.is_some());
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_resets_on_body_progress() {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(600)).await;
                tx.send_modify(|_| {});
            }
            tx.send_replace(true);
        });

        let start = Instant::now();
        let err = request_deadline(rx, Duration::from_secs(1), Duration::from_secs(5)).await;
        // three seconds of body followed by the header timeout
        assert!(err.to_string().contains("response headers"), "{err}");
        assert!(start.elapsed() >= Duration::from_secs(8), "{:?}", start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stalled_body() {
        let (_tx, rx) = watch::channel(false);
        let start = Instant::now();
        let err = request_deadline(rx, Duration::from_secs(1), Duration::from_secs(5)).await;
        assert!(err.to_string().contains("request body"), "{err}");
        assert!(start.elapsed() >= Duration::from_secs(1), "{:?}", start.elapsed());
        assert!(start.elapsed() < Duration::from_secs(5), "{:?}", start.elapsed());
    }

    // Yields `chunks` chunks of 64 bytes, one every `interval`
    struct PacedReader {
        chunks: usize,
        interval: Duration,
        sleep: Pin<Box<Sleep>>,
    }

    impl PacedReader {
        fn new(chunks: usize, interval: Duration) -> Self {
            Self {
                chunks,
                interval,
                sleep: Box::pin(tokio::time::sleep(interval)),
            }
        }
    }

    impl AsyncRead for PacedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.chunks == 0 {
                return Poll::Ready(Ok(()));
            }
            ready!(self.sleep.as_mut().poll(cx));
            let next = Instant::now() + self.interval;
            self.sleep.as_mut().reset(next);
            self.chunks -= 1;
            buf.put_slice(&[b'x'; 64]);
            Poll::Ready(Ok(()))
        }
    }

    // Accept one request, read it completely and answer 200. Returns the body length received.
    async fn serve_once(listener: TcpListener) -> usize {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the headers were complete");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let len: usize = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map(|v| v.trim().parse().unwrap())
            .unwrap();
        while buf.len() - header_end < len {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
            .await
            .unwrap();
        buf.len() - header_end
    }

    #[tokio::test]
    async fn test_slow_body_outlasts_idle_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener));

        let long = Duration::from_millis(500);
        let config = Config::builder()
            .endpoint(format!("http://{addr}"))
            .credentials(Credentials::new("ak", "sk", None))
            .timeout(HttpTimeout {
                read_write: Duration::from_secs(5),
                header: Duration::from_secs(5),
                long,
                ..Default::default()
            })
            .build()
            .unwrap();
        let transport = Arc::new(ReqwestTransport::new(&config).unwrap());

        // six chunks 250ms apart: well past `long` in total, never idle for that long
        let body = RequestBody::from_reader(
            Box::pin(PacedReader::new(6, Duration::from_millis(250))),
            Some(6 * 64),
        );
        let request = http::Request::builder()
            .method(http::Method::PUT)
            .uri(format!("http://{addr}/bucket/key"))
            .header(CONTENT_LENGTH, 6 * 64)
            .body(body)
            .unwrap();

        let start = Instant::now();
        let resp = transport.send(request).await.unwrap();
        assert_eq!(200, resp.status().as_u16());
        assert!(start.elapsed() > long, "{:?}", start.elapsed());
        assert_eq!(6 * 64, server.await.unwrap());
    }
}
