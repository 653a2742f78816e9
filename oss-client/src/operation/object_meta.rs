/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use http::header::{CONTENT_LENGTH, ETAG, LAST_MODIFIED};
use http::{HeaderMap, Method};

use crate::client::Handle;
use crate::conn::{self, Request, Response};
use crate::error::{Error, ErrorKind};
use crate::http::header;
use crate::operation::{required, RequestOptions};

/// Metadata of an object
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ObjectMetaOutput {
    /// Size in bytes
    pub content_length: Option<u64>,
    /// ETag
    pub etag: String,
    /// `Last-Modified`, as sent by the service
    pub last_modified: Option<String>,
    /// Version id of the object
    pub version_id: Option<String>,
    /// CRC64 of the object
    pub crc64: Option<u64>,
    /// Request id assigned by the service
    pub request_id: String,
    /// All response headers, including user metadata
    pub headers: HeaderMap,
}

impl ObjectMetaOutput {
    fn from_response(resp: Response) -> Self {
        Self {
            content_length: header::get_u64(&resp.headers, CONTENT_LENGTH.as_str()),
            etag: resp.header(ETAG.as_str()).unwrap_or_default(),
            last_modified: resp.header(LAST_MODIFIED.as_str()),
            version_id: resp.header(header::VERSION_ID),
            crc64: resp.server_crc,
            request_id: resp.request_id(),
            headers: resp.headers,
        }
    }

    /// Value of the user metadata entry `name`, sent as `x-oss-meta-<name>`
    pub fn meta(&self, name: &str) -> Option<&str> {
        let name = format!("{}{}", header::OSS_META_PREFIX, name.to_ascii_lowercase());
        header::get(&self.headers, &name)
    }
}

#[derive(Debug)]
struct Target {
    bucket: Option<String>,
    key: Option<String>,
    version_id: Option<String>,
    options: RequestOptions,
}

impl Target {
    async fn head(self, handle: &Handle, detailed: bool) -> Result<Response, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        conn::validate_object_name(&key)?;
        let mut req = Request::new(Method::HEAD, bucket, key).opt_param("versionId", self.version_id);
        if !detailed {
            req = req.param("objectMeta", None);
        }
        let req = self.options.apply(req)?;
        let resp = handle.conn.execute(req).await?;
        resp.check_status(&[200])?;
        Ok(resp)
    }
}

/// Fluent builder for `GetObjectMeta` and `GetObjectDetailedMeta`
#[derive(Debug)]
pub struct GetObjectMetaFluentBuilder {
    handle: Arc<Handle>,
    target: Target,
    detailed: bool,
}

impl GetObjectMetaFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            target: Target {
                bucket: None,
                key: None,
                version_id: None,
                options: RequestOptions::default(),
            },
            detailed: false,
        }
    }

    /// Bucket name
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.target.bucket = Some(bucket.into());
        self
    }

    /// Object key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.target.key = Some(key.into());
        self
    }

    /// Metadata of a specific version
    pub fn version_id(mut self, version_id: impl Into<String>) -> Self {
        self.target.version_id = Some(version_id.into());
        self
    }

    /// Fetch all headers, user metadata included, instead of the basic set
    pub fn detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.target.options = options;
        self
    }

    /// Send the request
    #[tracing::instrument(skip_all, level = "debug", name = "get-object-meta")]
    pub async fn send(self) -> Result<ObjectMetaOutput, Error> {
        let resp = self.target.head(&self.handle, self.detailed).await?;
        Ok(ObjectMetaOutput::from_response(resp))
    }
}

/// Fluent builder for `IsObjectExist`
#[derive(Debug)]
pub struct IsObjectExistFluentBuilder {
    inner: GetObjectMetaFluentBuilder,
}

impl IsObjectExistFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            inner: GetObjectMetaFluentBuilder::new(handle),
        }
    }

    /// Bucket name
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.inner = self.inner.bucket(bucket);
        self
    }

    /// Object key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.inner = self.inner.key(key);
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.inner = self.inner.options(options);
        self
    }

    /// `true` if the object exists, `false` if the service answers 404
    #[tracing::instrument(skip_all, level = "debug", name = "is-object-exist")]
    pub async fn send(self) -> Result<bool, Error> {
        match self.inner.send().await {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

fn is_not_found(err: &Error) -> bool {
    *err.kind() == ErrorKind::ServiceError && err.status_code() == Some(404)
}
