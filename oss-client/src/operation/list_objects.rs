/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use http::Method;

use crate::client::Handle;
use crate::conn::Request;
use crate::error::Error;
use crate::operation::{required, RequestOptions};
use crate::xml::ListObjectsResult;

/// Fluent builder for `ListObjects`.
///
/// Returns one page. Keys are requested URL encoded and decoded before they are returned, so
/// keys with control characters survive the XML transport.
#[derive(Debug)]
pub struct ListObjectsFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    prefix: Option<String>,
    marker: Option<String>,
    delimiter: Option<String>,
    max_keys: Option<u32>,
    options: RequestOptions,
}

impl ListObjectsFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            prefix: None,
            marker: None,
            delimiter: None,
            max_keys: None,
            options: RequestOptions::default(),
        }
    }

    /// Bucket name
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Only list keys starting with `prefix`
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Start after this key, usually the previous page's `next_marker`
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// Group keys sharing a prefix up to `delimiter` into common prefixes
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Page size, at most 1000
    pub fn max_keys(mut self, max_keys: u32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Send the request
    #[tracing::instrument(skip_all, level = "debug", name = "list-objects")]
    pub async fn send(self) -> Result<ListObjectsResult, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let req = Request::new(Method::GET, bucket, "")
            .opt_param("prefix", self.prefix)
            .opt_param("marker", self.marker)
            .opt_param("delimiter", self.delimiter)
            .opt_param("max-keys", self.max_keys.map(|n| n.to_string()))
            .param("encoding-type", Some("url".to_owned()));
        let req = self.options.apply(req)?;

        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[200])?;
        resp.xml::<ListObjectsResult>().await?.decode_keys()
    }
}
