/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use http::{HeaderValue, Method};

use crate::client::Handle;
use crate::conn::{self, Request};
use crate::error::{self, Error};
use crate::http::header;
use crate::operation::{object_headers, required, RequestOptions};
use crate::types::StorageClass;
use crate::url::query_escape;
use crate::xml::CopyObjectResult;

/// Response of a `CopyObject`
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct CopyObjectOutput {
    /// ETag and modification time of the new object
    pub result: CopyObjectResult,
    /// Version id of the new object
    pub version_id: Option<String>,
    /// Version id of the source that was copied
    pub source_version_id: Option<String>,
    /// Request id assigned by the service
    pub request_id: String,
}

/// Fluent builder for `CopyObject`, within a bucket or between two buckets
#[derive(Debug)]
pub struct CopyObjectFluentBuilder {
    handle: Arc<Handle>,
    source_bucket: Option<String>,
    source_key: Option<String>,
    source_version_id: Option<String>,
    bucket: Option<String>,
    key: Option<String>,
    storage_class: Option<StorageClass>,
    options: RequestOptions,
}

impl CopyObjectFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            source_bucket: None,
            source_key: None,
            source_version_id: None,
            bucket: None,
            key: None,
            storage_class: None,
            options: RequestOptions::default(),
        }
    }

    /// Bucket of the source object. Defaults to the destination bucket.
    pub fn source_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.source_bucket = Some(bucket.into());
        self
    }

    /// Key of the source object
    pub fn source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    /// Copy a specific version of the source
    pub fn source_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.source_version_id = Some(version_id.into());
        self
    }

    /// Destination bucket
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Destination key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Storage class of the new object
    pub fn storage_class(mut self, class: StorageClass) -> Self {
        self.storage_class = Some(class);
        self
    }

    /// Add a request header, e.g. `x-oss-metadata-directive`
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
    #[tracing::instrument(skip_all, level = "debug", name = "copy-object")]
    pub async fn send(self) -> Result<CopyObjectOutput, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        let source_bucket = self.source_bucket.unwrap_or_else(|| bucket.clone());
        let source_key = required(self.source_key, "source key")?;
        conn::validate_bucket_name(&source_bucket)?;
        conn::validate_object_name(&source_key)?;
        conn::validate_object_name(&key)?;

        let mut headers = object_headers(None, self.storage_class.as_ref())?;
        let source = copy_source(
            &source_bucket,
            &source_key,
            self.source_version_id.as_deref(),
        );
        headers.insert(
            header::COPY_SOURCE,
            HeaderValue::from_str(&source).map_err(error::invalid_input)?,
        );

        let req = Request::new(Method::PUT, bucket, key).headers(headers);
        let req = self.options.apply(req)?;
        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[200])?;

        let version_id = resp.header(header::VERSION_ID);
        let source_version_id = resp.header(header::COPY_SOURCE_VERSION_ID);
        let request_id = resp.request_id();
        let result = resp.xml::<CopyObjectResult>().await?;
        Ok(CopyObjectOutput {
            result,
            version_id,
            source_version_id,
            request_id,
        })
    }
}

/// Value of `x-oss-copy-source`: `/bucket/escaped-key[?versionId=id]`
fn copy_source(bucket: &str, key: &str, version_id: Option<&str>) -> String {
    let mut source = format!("/{bucket}/{}", query_escape(key));
    if let Some(version_id) = version_id {
        source.push_str("?versionId=");
        source.push_str(version_id);
    }
    source
}

#[cfg(test)]
mod test {
    use super::copy_source;

    #[test]
    fn test_copy_source() {
        assert_eq!("/src/a%2Fb%20c.txt", copy_source("src", "a/b c.txt", None));
        assert_eq!(
            "/src/k?versionId=v1",
            copy_source("src", "k", Some("v1"))
        );
    }
}
