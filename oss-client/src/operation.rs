/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use http::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

use crate::conn::Request;
use crate::error::{self, Error};
use crate::http::header;
use crate::progress::SharedProgressListener;
use crate::url::Params;

/// Upload a single object with `PutObject`
pub mod put_object;

/// Download a single object with `GetObject`
pub mod get_object;

/// Append to an appendable object
pub mod append_object;

/// Server side copy
pub mod copy_object;

/// Delete a single object
pub mod delete_object;

/// Delete many objects with one request
pub mod delete_objects;

/// Object metadata and existence checks
pub mod object_meta;

/// List the objects of a bucket
pub mod list_objects;

/// Multipart upload primitives
pub mod multipart;

/// Pre-signed URLs
pub mod presign;

/// Concurrent, resumable multipart upload of a local file
pub mod upload;

/// HTTP inputs and behavioral options shared by every operation.
///
/// Query parameters and headers are passed through as given, after the ones an operation sets
/// itself, so they can override them.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) params: Params,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) listener: Option<SharedProgressListener>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl RequestOptions {
    /// Empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter. An empty value renders as a bare key.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value: String = value.into();
        self.params
            .insert(key.into(), Some(value).filter(|v| !v.is_empty()));
        self
    }

    /// Add a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a user metadata header, `x-oss-meta-<name>`
    pub fn meta(self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        let name = format!("{}{}", header::OSS_META_PREFIX, name.as_ref());
        self.header(name, value)
    }

    /// Observe transfer progress
    pub fn progress_listener(mut self, listener: SharedProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Abort the request when `token` is cancelled
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn header_map(&self) -> Result<HeaderMap, Error> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(error::invalid_input)?;
            let value = HeaderValue::from_str(value).map_err(error::invalid_input)?;
            map.insert(name, value);
        }
        Ok(map)
    }

    /// Merge into `req`, validating header names and values
    pub(crate) fn apply(self, req: Request) -> Result<Request, Error> {
        let headers = self.header_map()?;
        Ok(req
            .params(self.params)
            .headers(headers)
            .listener(self.listener)
            .cancel(self.cancel))
    }
}

/// Headers set by an operation before caller supplied ones are merged in
pub(crate) fn object_headers(
    content_type: Option<&str>,
    storage_class: Option<&crate::types::StorageClass>,
) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    if let Some(content_type) = content_type {
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_str(content_type).map_err(error::invalid_input)?,
        );
    }
    if let Some(class) = storage_class {
        headers.insert(
            header::STORAGE_CLASS,
            HeaderValue::from_static(class.as_str()),
        );
    }
    Ok(headers)
}

/// Content type guessed from the first of `names` with a known extension
pub(crate) fn guess_content_type<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<String> {
    names
        .into_iter()
        .find_map(|name| mime_guess::from_path(name).first_raw())
        .map(str::to_owned)
}

pub(crate) fn required(value: Option<String>, what: &str) -> Result<String, Error> {
    value.ok_or_else(|| error::invalid_input(format!("{what} is required")))
}

#[cfg(test)]
mod test {
    use super::{guess_content_type, RequestOptions};
    use crate::error::ErrorKind;

    #[test]
    fn test_header_map() {
        let options = RequestOptions::new()
            .header("Content-Type", "text/plain")
            .meta("author", "foo")
            .param("acl", "");
        let headers = options.header_map().unwrap();
        assert_eq!("text/plain", headers["content-type"]);
        assert_eq!("foo", headers["x-oss-meta-author"]);
        assert_eq!(Some(&None), options.params.get("acl"));
        assert_eq!(Some("foo"), options.get_header("X-OSS-META-AUTHOR"));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let err = RequestOptions::new()
            .header("x-bad", "line\nbreak")
            .header_map()
            .unwrap_err();
        assert_eq!(&ErrorKind::InputInvalid, err.kind());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(
            Some("text/plain".to_owned()),
            guess_content_type(["noext", "notes.txt"])
        );
        assert_eq!(None, guess_content_type(["noext"]));
    }
}
