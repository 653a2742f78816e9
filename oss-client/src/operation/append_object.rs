/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};

use crate::client::Handle;
use crate::conn::{self, Request};
use crate::error::{Error, ErrorKind};
use crate::http::header;
use crate::io::InputStream;
use crate::operation::{guess_content_type, object_headers, required, RequestOptions};

/// Response of an `AppendObject`
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct AppendObjectOutput {
    /// Position to pass to the next append
    pub next_position: u64,
    /// CRC64 of the whole object after this append, as reported by the service. Seed of the
    /// next append's checksum.
    pub crc64: Option<u64>,
    /// Request id assigned by the service
    pub request_id: String,
    /// All response headers
    pub headers: HeaderMap,
}

/// Fluent builder for `AppendObject`
#[derive(Debug)]
pub struct AppendObjectFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    key: Option<String>,
    position: u64,
    init_crc: Option<u64>,
    body: InputStream,
    content_type: Option<String>,
    options: RequestOptions,
}

impl AppendObjectFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            key: None,
            position: 0,
            init_crc: None,
            body: InputStream::default(),
            content_type: None,
            options: RequestOptions::default(),
        }
    }

    /// Bucket name
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Object key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Current length of the object, 0 to create it
    pub fn position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    /// CRC64 of the object before this append, usually
    /// [`AppendObjectOutput::crc64`] of the previous call. Without it the checksum of an
    /// append at a non-zero position is not verified.
    pub fn init_crc(mut self, crc: u64) -> Self {
        self.init_crc = Some(crc);
        self
    }

    /// Bytes to append
    pub fn body(mut self, body: InputStream) -> Self {
        self.body = body;
        self
    }

    /// `Content-Type`, only honored when the object is created
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.header(name, value);
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Send the request
    #[tracing::instrument(skip_all, level = "debug", name = "append-object")]
    pub async fn send(self) -> Result<AppendObjectOutput, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        conn::validate_object_name(&key)?;

        let content_type = match self.content_type {
            Some(content_type) => Some(content_type),
            None if self.options.get_header(CONTENT_TYPE.as_str()).is_some() => None,
            None => guess_content_type([key.as_str()]),
        };
        let sent = self.body.size_hint().exact_len();
        let position = self.position;

        let mut req = Request::new(Method::POST, bucket, key)
            .param("append", None)
            .param("position", Some(position.to_string()))
            .headers(object_headers(content_type.as_deref(), None)?)
            .body(self.body);
        // the whole object's checksum is only computable from a known seed
        if let Some(crc) = self.init_crc {
            req = req.init_crc(crc).verify_crc("AppendObject");
        } else if position == 0 {
            req = req.verify_crc("AppendObject");
        }
        let req = self.options.apply(req)?;

        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[200])?;

        let request_id = resp.request_id();
        let next_position = header::get_u64(&resp.headers, header::NEXT_APPEND_POSITION)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::RuntimeError,
                    format!(
                        "append response carries no {} header, RequestId = {request_id}",
                        header::NEXT_APPEND_POSITION
                    ),
                )
            })?;
        if let Some(sent) = sent {
            if next_position != position + sent {
                return Err(Error::new(
                    ErrorKind::RuntimeError,
                    format!(
                        "next append position {next_position} does not match {position} + {sent} bytes sent, RequestId = {request_id}"
                    ),
                ));
            }
        }

        Ok(AppendObjectOutput {
            next_position,
            crc64: resp.server_crc,
            request_id,
            headers: resp.headers,
        })
    }
}
