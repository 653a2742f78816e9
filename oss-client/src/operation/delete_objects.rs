/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method};

use crate::client::Handle;
use crate::conn::Request;
use crate::error::{self, Error};
use crate::http::header;
use crate::io::md5;
use crate::operation::{required, RequestOptions};
use crate::xml::{self, Delete, DeleteObject, DeleteObjectsResult};

/// Most keys a single `DeleteObjects` request accepts
pub const MAX_DELETE_OBJECTS: usize = 1000;

/// Response of a `DeleteObjects`
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct DeleteObjectsOutput {
    /// Deleted keys with URL encoding removed. Empty in quiet mode.
    pub result: DeleteObjectsResult,
    /// Request id assigned by the service
    pub request_id: String,
}

/// Fluent builder for `DeleteObjects`
#[derive(Debug)]
pub struct DeleteObjectsFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    objects: Vec<DeleteObject>,
    quiet: bool,
    options: RequestOptions,
}

impl DeleteObjectsFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            objects: Vec::new(),
            quiet: false,
            options: RequestOptions::default(),
        }
    }

    /// Bucket name
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Add a key to delete
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.objects.push(DeleteObject::new(key));
        self
    }

    /// Add an object, optionally a specific version, to delete
    pub fn object(mut self, object: DeleteObject) -> Self {
        self.objects.push(object);
        self
    }

    /// Replace the objects to delete
    pub fn set_objects(mut self, objects: Vec<DeleteObject>) -> Self {
        self.objects = objects;
        self
    }

    /// Only report keys that failed
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Send the request
    #[tracing::instrument(skip_all, level = "debug", name = "delete-objects")]
    pub async fn send(self) -> Result<DeleteObjectsOutput, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let body = delete_body(&self.objects, self.quiet)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_MD5,
            HeaderValue::from_str(&md5::base64_md5(&body)).map_err(error::invalid_input)?,
        );
        let req = Request::new(Method::POST, bucket, "")
            .param("delete", None)
            .param("encoding-type", Some("url".to_owned()))
            .headers(headers)
            .body(body.into());
        let req = self.options.apply(req)?;

        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[200])?;
        let request_id = resp.request_id();
        let result = if self.quiet {
            // a quiet response may have an empty body
            let body = resp.body.collect().await?;
            if body.is_empty() {
                DeleteObjectsResult::default()
            } else {
                xml::from_bytes::<DeleteObjectsResult>(&body)?
            }
        } else {
            resp.xml::<DeleteObjectsResult>().await?
        };

        Ok(DeleteObjectsOutput {
            result: result.decode_keys()?,
            request_id,
        })
    }
}

fn delete_body(objects: &[DeleteObject], quiet: bool) -> Result<Bytes, Error> {
    if objects.is_empty() {
        return Err(error::invalid_input("no objects to delete"));
    }
    if objects.len() > MAX_DELETE_OBJECTS {
        return Err(error::invalid_input(format!(
            "at most {MAX_DELETE_OBJECTS} objects can be deleted at once, got {}",
            objects.len()
        )));
    }
    let xml = xml::to_string(&Delete { quiet, objects })?;
    Ok(Bytes::from(xml))
}

#[cfg(test)]
mod test {
    use super::delete_body;
    use crate::error::ErrorKind;
    use crate::xml::DeleteObject;

    #[test]
    fn test_delete_body_limits() {
        let err = delete_body(&[], false).unwrap_err();
        assert_eq!(&ErrorKind::InputInvalid, err.kind());

        let many: Vec<_> = (0..1001).map(|i| DeleteObject::new(format!("k{i}"))).collect();
        assert!(delete_body(&many, true).is_err());
        assert!(delete_body(&many[..1000], true).is_ok());
    }
}
