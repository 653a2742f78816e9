/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use http::header::{
    AUTHORIZATION, CONTENT_LENGTH, DATE, HOST, LOCATION, PROXY_AUTHORIZATION, USER_AGENT,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::auth::{self, Signer};
use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{
    self, CrcCheckError, Error, ErrorKind, ServiceError, UnexpectedRedirectError,
    UnexpectedStatusCodeError,
};
use crate::http::body::{BoxReader, CancellableStream};
use crate::http::{self as transport, header, RequestBody, ResponseBody, SharedHttpTransport};
use crate::io::crc64::SharedCrc64;
use crate::io::limit::{LimitedReader, LimitedStream};
use crate::io::md5;
use crate::io::tee::{Observers, TeeReader};
use crate::io::InputStream;
use crate::progress::{self, ByteTracker, ProgressEvent, ProgressEventKind, SharedProgressListener};
use crate::url::{encode_params, Params, UrlMaker};
use crate::xml;

const MAX_OBJECT_NAME_LEN: usize = 1023;

/// A single request to the service
#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) method: Method,
    pub(crate) bucket: String,
    pub(crate) object: String,
    pub(crate) params: Params,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<InputStream>,
    /// Seed of the request body CRC64
    pub(crate) init_crc: u64,
    /// Operation name reported on a CRC64 mismatch. `None` skips the comparison.
    pub(crate) verify_crc: Option<&'static str>,
    pub(crate) listener: Option<SharedProgressListener>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl Request {
    pub(crate) fn new(method: Method, bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            method,
            bucket: bucket.into(),
            object: object.into(),
            params: Params::new(),
            headers: HeaderMap::new(),
            body: None,
            init_crc: 0,
            verify_crc: None,
            listener: None,
            cancel: None,
        }
    }

    pub(crate) fn param(mut self, key: &str, value: Option<String>) -> Self {
        self.params.insert(key.to_owned(), value);
        self
    }

    /// Add `key=value` when `value` is set, nothing otherwise
    pub(crate) fn opt_param(self, key: &str, value: Option<String>) -> Self {
        match value {
            Some(value) => self.param(key, Some(value)),
            None => self,
        }
    }

    pub(crate) fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    pub(crate) fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub(crate) fn body(mut self, body: InputStream) -> Self {
        self.body = Some(body);
        self
    }

    pub(crate) fn init_crc(mut self, crc: u64) -> Self {
        self.init_crc = crc;
        self
    }

    pub(crate) fn verify_crc(mut self, operation: &'static str) -> Self {
        self.verify_crc = Some(operation);
        self
    }

    pub(crate) fn listener(mut self, listener: Option<SharedProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    pub(crate) fn cancel(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }
}

/// A successful (2xx) response
#[derive(Debug)]
pub(crate) struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: ResponseBody,
    /// CRC64 of the request body as sent, when CRC64 checks are enabled
    pub(crate) client_crc: Option<u64>,
    /// Value of `x-oss-hash-crc64ecma`, when present
    pub(crate) server_crc: Option<u64>,
}

impl Response {
    pub(crate) fn request_id(&self) -> String {
        header::get(&self.headers, header::REQUEST_ID)
            .unwrap_or_default()
            .to_owned()
    }

    pub(crate) fn header(&self, name: &str) -> Option<String> {
        header::get(&self.headers, name).map(str::to_owned)
    }

    /// Fail unless the status code is one of `allowed`
    pub(crate) fn check_status(&self, allowed: &[u16]) -> Result<(), Error> {
        let got = self.status.as_u16();
        if allowed.contains(&got) {
            return Ok(());
        }
        Err(Error::new(
            ErrorKind::UnexpectedStatusCode,
            UnexpectedStatusCodeError {
                allowed: allowed.to_vec(),
                got,
            },
        ))
    }

    /// Compare client and server CRC64. A missing or zero value on either side is not compared.
    pub(crate) fn check_crc(&self, operation: &str) -> Result<(), Error> {
        check_crc(
            self.client_crc,
            self.server_crc,
            operation,
            &self.request_id(),
        )
    }

    /// Read the body to the end and decode it as XML
    pub(crate) async fn xml<T: DeserializeOwned>(self) -> Result<T, Error> {
        let body = self.body.collect().await?;
        xml::from_bytes(&body)
    }
}

pub(crate) fn check_crc(
    client_crc: Option<u64>,
    server_crc: Option<u64>,
    operation: &str,
    request_id: &str,
) -> Result<(), Error> {
    match (client_crc, server_crc) {
        (Some(client_crc), Some(server_crc))
            if client_crc != 0 && server_crc != 0 && client_crc != server_crc =>
        {
            Err(Error::new(
                ErrorKind::CrcMismatch,
                CrcCheckError {
                    client_crc,
                    server_crc,
                    operation: operation.to_owned(),
                    request_id: request_id.to_owned(),
                },
            ))
        }
        _ => Ok(()),
    }
}

/// Request engine: builds, signs and dispatches requests and classifies their responses
#[derive(Debug)]
pub(crate) struct Conn {
    config: Config,
    url: UrlMaker,
    transport: SharedHttpTransport,
}

impl Conn {
    pub(crate) fn new(config: Config) -> Result<Self, Error> {
        let url = UrlMaker::new(
            config.endpoint(),
            config.is_cname(),
            config.is_path_style(),
            config.proxy().is_some(),
        )?;
        let transport = match config.transport() {
            Some(transport) => transport.clone(),
            None => transport::default_transport(&config)?,
        };
        Ok(Self {
            config,
            url,
            transport,
        })
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    fn signer(&self) -> Signer<'_> {
        Signer::new(self.config.auth_version(), self.config.additional_headers())
    }

    async fn credentials(&self) -> Result<Credentials, Error> {
        self.config
            .credentials_provider()
            .provide_credentials()
            .await
    }

    /// Sign and send a request addressed by bucket and object
    pub(crate) async fn execute(&self, req: Request) -> Result<Response, Error> {
        if !req.bucket.is_empty() {
            validate_bucket_name(&req.bucket)?;
        }
        let signer = self.signer();
        let sub_resource = signer.sub_resource(&req.params);
        let resource = signer.resource(&req.bucket, &req.object, &sub_resource);
        let url = self
            .url
            .url(&req.bucket, &req.object, &encode_params(&req.params));
        let (host, _) = self.url.build(&req.bucket, &req.object);
        self.dispatch(url, host, Some(resource), req).await
    }

    /// Send a request to a pre-signed URL. The request is not signed again.
    pub(crate) async fn execute_url(&self, signed_url: &str, req: Request) -> Result<Response, Error> {
        let uri: http::Uri = signed_url
            .parse()
            .map_err(|e| error::invalid_input(format!("invalid signed url: {e}")))?;
        let host = uri
            .authority()
            .map(|a| a.as_str().to_owned())
            .ok_or_else(|| error::invalid_input("signed url has no host"))?;
        self.dispatch(signed_url.to_owned(), host, None, req).await
    }

    async fn dispatch(
        &self,
        url: String,
        host: String,
        resource: Option<String>,
        req: Request,
    ) -> Result<Response, Error> {
        let Request {
            method,
            headers: caller_headers,
            body,
            init_crc,
            verify_crc,
            listener,
            cancel,
            ..
        } = req;

        let mut headers = HeaderMap::new();
        let crc = self
            .config
            .crc_enabled()
            .then(|| SharedCrc64::new(init_crc));
        let observers = Observers {
            crc: crc.clone(),
            tracker: ByteTracker::default(),
            listener: listener.clone(),
            total: None,
        };
        let tracker = observers.tracker.clone();
        let caller_md5 = caller_headers.contains_key(header::CONTENT_MD5);
        let (body, content_length) = self
            .prepare_body(&method, body, observers, caller_md5, &mut headers)
            .await?;

        if let Some(proxy) = self.config.proxy() {
            if let (Some(user), Some(password)) = (&proxy.user, &proxy.password) {
                let basic = format!("Basic {}", BASE64.encode(format!("{user}:{password}")));
                headers.insert(PROXY_AUTHORIZATION, header_value(&basic)?);
            }
        }

        let credentials = match resource {
            Some(_) => {
                headers.insert(DATE, header_value(&auth::http_date(Utc::now()))?);
                Some(self.credentials().await?)
            }
            None => None,
        };
        headers.insert(HOST, header_value(&host)?);
        headers.insert(USER_AGENT, header_value(self.config.user_agent())?);
        if let Some(token) = credentials.as_ref().and_then(|c| c.security_token()) {
            headers.insert(header::SECURITY_TOKEN, header_value(token)?);
        }

        // caller supplied values win over the defaults above
        headers.extend(caller_headers);

        if let (Some(resource), Some(credentials)) = (&resource, &credentials) {
            let authorization = self
                .signer()
                .authorization(&method, &headers, resource, credentials);
            headers.insert(AUTHORIZATION, header_value(&authorization)?);
        }

        tracing::debug!(
            method = %method,
            url = %url,
            headers = ?RedactedHeaders(&headers),
            "sending request"
        );

        let mut request = http::Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .body(body)?;
        *request.headers_mut() = headers;

        progress::publish(
            listener.as_ref(),
            ProgressEvent::new(ProgressEventKind::Started, 0, content_length, 0),
        );

        let send = self.transport.send(request);
        let result = match &cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(error::operation_cancelled()),
                resp = send => resp.map_err(error::from_kind(ErrorKind::Transport)),
            },
            None => send.await.map_err(error::from_kind(ErrorKind::Transport)),
        };

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                tracing::debug!(error = %err, url = %url, "request failed");
                progress::publish(
                    listener.as_ref(),
                    ProgressEvent::new(
                        ProgressEventKind::Failed,
                        tracker.get(),
                        content_length,
                        0,
                    ),
                );
                return Err(err);
            }
        };

        tracing::debug!(
            status = %resp.status(),
            request_id = header::get(resp.headers(), header::REQUEST_ID).unwrap_or_default(),
            "received response"
        );
        progress::publish(
            listener.as_ref(),
            ProgressEvent::new(
                ProgressEventKind::Completed,
                tracker.get(),
                content_length,
                0,
            ),
        );

        // the token keeps covering the response body after the headers arrived
        let resp = match cancel {
            Some(token) => resp.map(|body| {
                ResponseBody::from_stream(CancellableStream::new(body.into_inner(), token))
            }),
            None => resp,
        };
        self.handle_response(&method, resp, crc, verify_crc).await
    }

    /// Install the body pipeline: MD5 precomputation, CRC64/progress tee and upload pacing
    async fn prepare_body(
        &self,
        method: &Method,
        body: Option<InputStream>,
        observers: Observers,
        caller_md5: bool,
        headers: &mut HeaderMap,
    ) -> Result<(RequestBody, Option<u64>), Error> {
        let Some(body) = body else {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(0u64));
            return Ok((RequestBody::empty(), Some(0)));
        };

        let (mut reader, mut content_length) = body.into_reader().await?;
        if self.config.md5_enabled() && !caller_md5 {
            let precomputed =
                md5::precompute(reader, content_length, self.config.md5_threshold()).await?;
            reader = precomputed.reader;
            content_length = precomputed.content_length;
            headers.insert(header::CONTENT_MD5, header_value(&precomputed.content_md5)?);
        }
        if let Some(len) = content_length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }

        let observers = Observers {
            total: content_length,
            ..observers
        };
        let mut reader: BoxReader = Box::pin(TeeReader::new(reader, observers));

        if let Some(limiter) = self.config.upload_limiter() {
            let limited_method = ![Method::GET, Method::DELETE, Method::HEAD].contains(method);
            if limited_method && content_length.unwrap_or_default() > 0 {
                reader = Box::pin(LimitedReader::new(reader, limiter.clone()));
            }
        }

        Ok((RequestBody::from_reader(reader, content_length), content_length))
    }

    async fn handle_response(
        &self,
        method: &Method,
        resp: http::Response<ResponseBody>,
        crc: Option<SharedCrc64>,
        verify_crc: Option<&'static str>,
    ) -> Result<Response, Error> {
        let (parts, body) = resp.into_parts();
        let status = parts.status;
        let code = status.as_u16();

        if status.is_success() {
            let body = match self.config.download_limiter() {
                Some(limiter) if *method == Method::GET => ResponseBody::from_stream(
                    LimitedStream::new(body.into_inner(), limiter.clone()),
                ),
                _ => body,
            };
            let resp = Response {
                status,
                server_crc: header::get_u64(&parts.headers, header::HASH_CRC64),
                headers: parts.headers,
                body,
                client_crc: crc.map(|c| c.get()),
            };
            if let Some(operation) = verify_crc {
                resp.check_crc(operation)?;
            }
            return Ok(resp);
        }

        if (300..=307).contains(&code) {
            let location = header::get(&parts.headers, LOCATION.as_str()).map(str::to_owned);
            let body = body.collect().await.unwrap_or_default();
            return Err(Error::new(
                ErrorKind::UnexpectedRedirect,
                UnexpectedRedirectError {
                    status_code: code,
                    location,
                    body,
                },
            ));
        }

        let body = body.collect().await?;
        Err(service_error(status, &parts.headers, &body))
    }

    /// Pre-signed URL valid until `expires` (Unix seconds)
    pub(crate) async fn sign_url(
        &self,
        method: &Method,
        bucket: &str,
        object: &str,
        expires: i64,
        mut params: Params,
        mut headers: HeaderMap,
    ) -> Result<String, Error> {
        validate_bucket_name(bucket)?;
        let credentials = self.credentials().await?;
        self.signer().presign(
            method,
            bucket,
            object,
            expires,
            &mut params,
            &mut headers,
            &credentials,
        );
        Ok(self.url.sign_url(bucket, object, &encode_params(&params)))
    }

    /// Signed live channel push URL valid until `expires` (Unix seconds)
    pub(crate) async fn sign_rtmp_url(
        &self,
        bucket: &str,
        channel: &str,
        playlist_name: Option<&str>,
        expires: i64,
    ) -> Result<String, Error> {
        validate_bucket_name(bucket)?;
        let credentials = self.credentials().await?;
        let params = auth::rtmp_params(bucket, channel, playlist_name, expires, &credentials);
        Ok(self.url.rtmp_url(bucket, channel, &encode_params(&params)))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(error::invalid_input)
}

/// Build the error for a non 2xx, non redirect response
fn service_error(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Error {
    let code = status.as_u16();
    let request_id = header::get(headers, header::REQUEST_ID).unwrap_or_default();
    let ec = header::get(headers, header::EC).unwrap_or_default();

    let mut document = body.to_vec();
    if document.is_empty() {
        if let Some(decoded) = header::get(headers, header::ERR).and_then(|v| BASE64.decode(v).ok())
        {
            document = decoded;
        }
    }

    if document.is_empty() {
        return Error::new(
            ErrorKind::ServiceError,
            ServiceError {
                status_code: code,
                request_id: request_id.to_owned(),
                ec: ec.to_owned(),
                ..Default::default()
            },
        );
    }

    match xml::from_bytes::<ServiceError>(&document) {
        // documents with another root element decode without a code
        Ok(mut err) if !err.code.is_empty() => {
            err.status_code = code;
            if !request_id.is_empty() {
                err.request_id = request_id.to_owned();
            }
            if err.ec.is_empty() {
                err.ec = ec.to_owned();
            }
            err.raw_message = String::from_utf8_lossy(&document).into_owned();
            Error::new(ErrorKind::ServiceError, err)
        }
        _ => {
            let what = if (400..=505).contains(&code) {
                "service returned invalid response body"
            } else {
                "unknown response body"
            };
            let mut message = format!("{what}, status = {status}, RequestId = {request_id}");
            if !ec.is_empty() {
                message.push_str(&format!(", ec = {ec}"));
            }
            Error::new(ErrorKind::ServiceError, message)
        }
    }
}

/// Bucket names are 3 to 63 lowercase letters, digits or hyphens, not starting or ending with
/// a hyphen
pub(crate) fn validate_bucket_name(name: &str) -> Result<(), Error> {
    let valid_chars = name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if (3..=63).contains(&name.len())
        && valid_chars
        && !name.starts_with('-')
        && !name.ends_with('-')
    {
        return Ok(());
    }
    Err(error::invalid_input(format!("bucket name {name:?} is invalid")))
}

pub(crate) fn validate_object_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(error::invalid_input("object name is empty"));
    }
    if name.len() > MAX_OBJECT_NAME_LEN {
        return Err(error::invalid_input(format!(
            "object name is longer than {MAX_OBJECT_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

struct RedactedHeaders<'a>(&'a HeaderMap);

impl fmt::Debug for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.0 {
            if name == AUTHORIZATION || name == PROXY_AUTHORIZATION {
                map.entry(&name.as_str(), &"** redacted **");
            } else {
                map.entry(&name.as_str(), value);
            }
        }
        map.finish()
    }
}
