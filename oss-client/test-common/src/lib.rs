/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Helpers shared by the integration tests: a rule based mock transport that records every
//! request it receives, and temporary test files.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use oss_client::config::Config;
use oss_client::credentials::Credentials;
use oss_client::error::BoxError;
use oss_client::http::{HttpTransport, RequestBody, ResponseBody};
use oss_client::Client;
use percent_encoding::percent_decode_str;
use tempfile::NamedTempFile;

pub const TEST_ENDPOINT: &str = "http://oss-cn-hangzhou.aliyuncs.com";
pub const TEST_BUCKET: &str = "test-bucket";

/// A request as seen by the mock transport, body included
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: http::Method,
    pub uri: http::Uri,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    /// Decoded query parameters in request order. Bare keys have an empty value.
    pub fn query(&self) -> Vec<(String, String)> {
        let Some(query) = self.uri.query() else {
            return Vec::new();
        };
        query
            .split('&')
            .filter(|kv| !kv.is_empty())
            .map(|kv| {
                let (k, v) = kv.split_once('=').unwrap_or((kv, ""));
                (decode(k), decode(v))
            })
            .collect()
    }

    /// Value of query parameter `name`, `Some("")` for a bare key
    pub fn param(&self, name: &str) -> Option<String> {
        self.query()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }

    /// Multipart part number of an `UploadPart` request
    pub fn part_number(&self) -> Option<u64> {
        self.param("partNumber").map(|n| n.parse().unwrap())
    }
}

fn decode(s: &str) -> String {
    percent_decode_str(&s.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

/// Canned response
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
    delay: Option<Duration>,
}

impl MockResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: vec![("x-oss-request-id".to_owned(), "mock-request-id".to_owned())],
            body: Bytes::new(),
            delay: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Hold the response back for `delay`
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Service error document with the given status and code
    pub fn service_error(status: u16, code: &str, message: &str) -> Self {
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error>\n  <Code>{code}</Code>\n  <Message>{message}</Message>\n  <RequestId>mock-request-id</RequestId>\n  <HostId>{TEST_BUCKET}.oss-cn-hangzhou.aliyuncs.com</HostId>\n</Error>"
        );
        Self::new(status)
            .header("content-type", "application/xml")
            .body(body)
    }
}

type Matcher = Box<dyn Fn(&RecordedRequest) -> bool + Send + Sync>;
type Responder = Box<dyn Fn(&RecordedRequest) -> MockResponse + Send + Sync>;

/// Answers the requests it matches, optionally a limited number of times
pub struct Rule {
    matcher: Matcher,
    responder: Responder,
    remaining: Option<usize>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl Rule {
    /// Rule applying to requests `matcher` accepts
    pub fn when(matcher: impl Fn(&RecordedRequest) -> bool + Send + Sync + 'static) -> Self {
        Self {
            matcher: Box::new(matcher),
            responder: Box::new(|_| MockResponse::ok()),
            remaining: None,
        }
    }

    pub fn then(mut self, responder: impl Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static) -> Self {
        self.responder = Box::new(responder);
        self
    }

    pub fn then_response(self, response: MockResponse) -> Self {
        self.then(move |_| response.clone())
    }

    /// Only answer the first `n` matching requests
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }
}

/// Transport answering requests from a list of rules, first match wins.
///
/// Every request is recorded, its body read to the end, before a rule is picked. Requests
/// no rule matches fail at the transport level.
#[derive(Debug, Default)]
pub struct MockTransport {
    rules: Mutex<Vec<Rule>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(self, rule: Rule) -> Self {
        self.rules.lock().unwrap().push(rule);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests `pred` accepts
    pub fn count(&self, pred: impl Fn(&RecordedRequest) -> bool) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| pred(r)).count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> Result<http::Response<ResponseBody>, BoxError> {
        let (parts, body) = request.into_parts();
        let body = body.collect().await?;
        let recorded = RecordedRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        };
        self.requests.lock().unwrap().push(recorded.clone());

        let response = {
            let mut rules = self.rules.lock().unwrap();
            let rule = rules
                .iter_mut()
                .find(|rule| rule.remaining != Some(0) && (rule.matcher)(&recorded));
            match rule {
                Some(rule) => {
                    if let Some(remaining) = rule.remaining.as_mut() {
                        *remaining -= 1;
                    }
                    (rule.responder)(&recorded)
                }
                None => {
                    return Err(format!(
                        "no rule matched {} {}",
                        recorded.method, recorded.uri
                    )
                    .into())
                }
            }
        };

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }
        let mut builder = http::Response::builder().status(response.status);
        for (name, value) in &response.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        Ok(builder.body(ResponseBody::from(response.body))?)
    }
}

/// Matches multipart `InitiateMultipartUpload`
pub fn is_initiate(req: &RecordedRequest) -> bool {
    req.method == http::Method::POST && req.has_param("uploads")
}

/// Matches multipart `UploadPart`
pub fn is_upload_part(req: &RecordedRequest) -> bool {
    req.method == http::Method::PUT && req.has_param("partNumber") && req.has_param("uploadId")
}

/// Matches multipart `CompleteMultipartUpload`
pub fn is_complete(req: &RecordedRequest) -> bool {
    req.method == http::Method::POST && req.has_param("uploadId")
}

/// Matches multipart `AbortMultipartUpload`
pub fn is_abort(req: &RecordedRequest) -> bool {
    req.method == http::Method::DELETE && req.has_param("uploadId")
}

pub fn initiate_response(upload_id: &str, key: &str) -> MockResponse {
    MockResponse::ok().body(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<InitiateMultipartUploadResult>\n  <Bucket>{TEST_BUCKET}</Bucket>\n  <Key>{key}</Key>\n  <UploadId>{upload_id}</UploadId>\n</InitiateMultipartUploadResult>"
    ))
}

pub fn upload_part_response(req: &RecordedRequest) -> MockResponse {
    let part = req.part_number().unwrap_or_default();
    MockResponse::ok().header("etag", format!("\"etag-{part}\""))
}

pub fn complete_response(key: &str) -> MockResponse {
    MockResponse::ok().body(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<CompleteMultipartUploadResult>\n  <Location>http://{TEST_BUCKET}.oss-cn-hangzhou.aliyuncs.com/{key}</Location>\n  <Bucket>{TEST_BUCKET}</Bucket>\n  <Key>{key}</Key>\n  <ETag>\"complete-etag\"</ETag>\n</CompleteMultipartUploadResult>"
    ))
}

/// Client talking to `transport`
pub fn mock_client(transport: Arc<MockTransport>) -> Client {
    mock_client_with(transport, |builder| builder)
}

/// Client talking to `transport`, with further configuration applied by `f`
pub fn mock_client_with(
    transport: Arc<MockTransport>,
    f: impl FnOnce(oss_client::config::Builder) -> oss_client::config::Builder,
) -> Client {
    let builder = Config::builder()
        .endpoint(TEST_ENDPOINT)
        .credentials(Credentials::new("test-key", "test-secret", None))
        .transport(transport);
    Client::new(f(builder).build().unwrap()).unwrap()
}

/// Send logs to the test output, filtered by `RUST_LOG`
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic, non repeating-per-part content
pub fn test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Temporary file holding `data`, removed when dropped
pub fn create_test_file(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}
