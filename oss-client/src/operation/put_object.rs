/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::path::PathBuf;
use std::sync::Arc;

use http::header::{CONTENT_TYPE, ETAG};
use http::{HeaderMap, Method};

use crate::client::Handle;
use crate::conn::{self, Request, Response};
use crate::error::{self, Error};
use crate::http::header;
use crate::io::InputStream;
use crate::operation::{guess_content_type, object_headers, required, RequestOptions};
use crate::types::StorageClass;

/// Response of a `PutObject`
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct PutObjectOutput {
    /// ETag of the new object
    pub etag: String,
    /// Version id, when versioning is enabled on the bucket
    pub version_id: Option<String>,
    /// CRC64 of the object as reported by the service
    pub crc64: Option<u64>,
    /// Request id assigned by the service
    pub request_id: String,
    /// All response headers
    pub headers: HeaderMap,
}

impl PutObjectOutput {
    pub(crate) fn from_response(resp: &Response) -> Self {
        Self {
            etag: resp.header(ETAG.as_str()).unwrap_or_default(),
            version_id: resp.header(header::VERSION_ID),
            crc64: resp.server_crc,
            request_id: resp.request_id(),
            headers: resp.headers.clone(),
        }
    }
}

#[derive(Debug, Default)]
enum Source {
    #[default]
    Empty,
    Stream(InputStream),
    File(PathBuf),
}

/// Fluent builder for `PutObject`, `PutObjectFromFile` and `PutObjectWithURL`
#[derive(Debug)]
pub struct PutObjectFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    key: Option<String>,
    signed_url: Option<String>,
    source: Source,
    content_type: Option<String>,
    storage_class: Option<StorageClass>,
    options: RequestOptions,
}

impl PutObjectFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            key: None,
            signed_url: None,
            source: Source::default(),
            content_type: None,
            storage_class: None,
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

    pub(crate) fn signed_url(mut self, url: impl Into<String>) -> Self {
        self.signed_url = Some(url.into());
        self
    }

    /// Object content
    pub fn body(mut self, body: InputStream) -> Self {
        self.source = Source::Stream(body);
        self
    }

    /// Upload the content of a local file. The content type is guessed from the key, then
    /// from the file name.
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Source::File(path.into());
        self
    }

    /// `Content-Type` of the object. Guessed from the key's extension when not set.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Storage class of the object
    pub fn storage_class(mut self, class: StorageClass) -> Self {
        self.storage_class = Some(class);
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
    #[tracing::instrument(skip_all, level = "debug", name = "put-object")]
    pub async fn send(self) -> Result<PutObjectOutput, Error> {
        let handle = self.handle.clone();
        let (target, req) = self.into_request()?;
        let resp = match target {
            Target::Object => handle.conn.execute(req).await?,
            Target::Url(url) => handle.conn.execute_url(&url, req).await?,
        };
        resp.check_status(&[200])?;
        Ok(PutObjectOutput::from_response(&resp))
    }

    fn into_request(self) -> Result<(Target, Request), Error> {
        let (target, bucket, key) = match self.signed_url {
            Some(url) => (Target::Url(url), String::new(), self.key.unwrap_or_default()),
            None => {
                let bucket = required(self.bucket, "bucket")?;
                let key = required(self.key, "key")?;
                conn::validate_object_name(&key)?;
                (Target::Object, bucket, key)
            }
        };

        let (body, file_name) = match self.source {
            Source::Empty => (InputStream::default(), None),
            Source::Stream(stream) => (stream, None),
            Source::File(path) => {
                let stream = InputStream::from_path(&path).map_err(|e| {
                    error::invalid_input(format!("cannot read {}: {e}", path.display()))
                })?;
                (stream, Some(path.to_string_lossy().into_owned()))
            }
        };

        let content_type = match (&self.content_type, &target) {
            (Some(content_type), _) => Some(content_type.clone()),
            // a signed url is only valid with the headers it was signed with
            (None, Target::Url(_)) => None,
            (None, Target::Object) if self.options.get_header(CONTENT_TYPE.as_str()).is_some() => {
                None
            }
            (None, Target::Object) => {
                guess_content_type([key.as_str()].into_iter().chain(file_name.as_deref()))
            }
        };

        let req = Request::new(Method::PUT, bucket, key)
            .headers(object_headers(
                content_type.as_deref(),
                self.storage_class.as_ref(),
            )?)
            .body(body)
            .verify_crc("PutObject");
        Ok((target, self.options.apply(req)?))
    }
}

enum Target {
    Object,
    Url(String),
}
