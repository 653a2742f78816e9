/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use http::Method;

use crate::client::Handle;
use crate::conn::{self, Request};
use crate::error::Error;
use crate::http::header;
use crate::operation::{required, RequestOptions};

/// Response of a `DeleteObject`
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct DeleteObjectOutput {
    /// Version that was deleted, or of the delete marker that was created
    pub version_id: Option<String>,
    /// Whether a delete marker was involved
    pub delete_marker: bool,
    /// Request id assigned by the service
    pub request_id: String,
}

/// Fluent builder for `DeleteObject`
#[derive(Debug)]
pub struct DeleteObjectFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    key: Option<String>,
    version_id: Option<String>,
    options: RequestOptions,
}

impl DeleteObjectFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            key: None,
            version_id: None,
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

    /// Delete a specific version
    pub fn version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Send the request. Deleting a missing object succeeds.
    #[tracing::instrument(skip_all, level = "debug", name = "delete-object")]
    pub async fn send(self) -> Result<DeleteObjectOutput, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        conn::validate_object_name(&key)?;

        let req = Request::new(Method::DELETE, bucket, key).opt_param("versionId", self.version_id);
        let req = self.options.apply(req)?;
        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[204])?;

        Ok(DeleteObjectOutput {
            version_id: resp.header(header::VERSION_ID),
            delete_marker: resp
                .header(header::DELETE_MARKER)
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            request_id: resp.request_id(),
        })
    }
}
