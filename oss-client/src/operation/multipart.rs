/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The building blocks of a multipart upload. [`Client::upload_file`](crate::Client::upload_file)
//! drives them for local files.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, ETAG};
use http::Method;

use crate::client::Handle;
use crate::conn::{self, Request};
use crate::error::{self, Error};
use crate::http::header;
use crate::io::{InputStream, MAX_PARTS};
use crate::operation::{guess_content_type, object_headers, required, RequestOptions};
use crate::types::StorageClass;
use crate::xml::{
    self, CompleteMultipartUpload, CompleteMultipartUploadResult, InitiateMultipartUploadResult,
    ListMultipartUploadsResult, ListUploadedPartsResult, UploadPart,
};

/// Fluent builder for `InitiateMultipartUpload`
#[derive(Debug)]
pub struct InitiateMultipartUploadFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    key: Option<String>,
    content_type: Option<String>,
    storage_class: Option<StorageClass>,
    options: RequestOptions,
}

impl InitiateMultipartUploadFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            key: None,
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

    /// `Content-Type` of the final object. Guessed from the key when not set.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Storage class of the final object
    pub fn storage_class(mut self, class: StorageClass) -> Self {
        self.storage_class = Some(class);
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Send the request
    #[tracing::instrument(skip_all, level = "debug", name = "initiate-multipart-upload")]
    pub async fn send(self) -> Result<InitiateMultipartUploadResult, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        conn::validate_object_name(&key)?;

        let content_type = match self.content_type {
            Some(content_type) => Some(content_type),
            None if self.options.get_header(CONTENT_TYPE.as_str()).is_some() => None,
            None => guess_content_type([key.as_str()]),
        };
        let req = Request::new(Method::POST, bucket, key)
            .param("uploads", None)
            .headers(object_headers(
                content_type.as_deref(),
                self.storage_class.as_ref(),
            )?);
        let req = self.options.apply(req)?;

        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[200])?;
        resp.xml().await
    }
}

/// Response of an `UploadPart`
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct UploadPartOutput {
    /// Reference to pass to `CompleteMultipartUpload`
    pub part: UploadPart,
    /// CRC64 of the part as reported by the service
    pub crc64: Option<u64>,
    /// Request id assigned by the service
    pub request_id: String,
}

/// Fluent builder for `UploadPart`
#[derive(Debug)]
pub struct UploadPartFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    key: Option<String>,
    upload_id: Option<String>,
    part_number: u64,
    body: InputStream,
    options: RequestOptions,
}

impl UploadPartFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            key: None,
            upload_id: None,
            part_number: 0,
            body: InputStream::default(),
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

    /// Upload id returned by `InitiateMultipartUpload`
    pub fn upload_id(mut self, upload_id: impl Into<String>) -> Self {
        self.upload_id = Some(upload_id.into());
        self
    }

    /// Part number, from 1 to 10000
    pub fn part_number(mut self, part_number: u64) -> Self {
        self.part_number = part_number;
        self
    }

    /// Content of the part. Use [`InputStream::read_from`] to upload a section of a file.
    pub fn body(mut self, body: InputStream) -> Self {
        self.body = body;
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Send the request
    #[tracing::instrument(skip_all, level = "debug", name = "upload-part", fields(part_number = self.part_number))]
    pub async fn send(self) -> Result<UploadPartOutput, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        let upload_id = required(self.upload_id, "upload id")?;
        if !(1..=MAX_PARTS).contains(&self.part_number) {
            return Err(error::invalid_input(format!(
                "part number {} is not between 1 and {MAX_PARTS}",
                self.part_number
            )));
        }

        let req = Request::new(Method::PUT, bucket, key)
            .param("partNumber", Some(self.part_number.to_string()))
            .param("uploadId", Some(upload_id))
            .body(self.body)
            .verify_crc("UploadPart");
        let req = self.options.apply(req)?;

        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[200])?;
        Ok(UploadPartOutput {
            part: UploadPart {
                part_number: self.part_number,
                etag: resp.header(ETAG.as_str()).unwrap_or_default(),
            },
            crc64: resp.server_crc,
            request_id: resp.request_id(),
        })
    }
}

/// Response of a `CompleteMultipartUpload`
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct CompleteMultipartUploadOutput {
    /// Location and ETag of the assembled object. Empty when a callback was requested.
    pub result: CompleteMultipartUploadResult,
    /// Body returned by the callback server, when `x-oss-callback` was sent
    pub callback_body: Option<Bytes>,
    /// CRC64 of the assembled object as reported by the service
    pub crc64: Option<u64>,
    /// Version id of the assembled object
    pub version_id: Option<String>,
    /// Request id assigned by the service
    pub request_id: String,
}

/// Fluent builder for `CompleteMultipartUpload`
#[derive(Debug)]
pub struct CompleteMultipartUploadFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    key: Option<String>,
    upload_id: Option<String>,
    parts: Vec<UploadPart>,
    options: RequestOptions,
}

impl CompleteMultipartUploadFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            key: None,
            upload_id: None,
            parts: Vec::new(),
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

    /// Upload id returned by `InitiateMultipartUpload`
    pub fn upload_id(mut self, upload_id: impl Into<String>) -> Self {
        self.upload_id = Some(upload_id.into());
        self
    }

    /// Add an uploaded part
    pub fn part(mut self, part: UploadPart) -> Self {
        self.parts.push(part);
        self
    }

    /// Replace the uploaded parts. Order does not matter.
    pub fn set_parts(mut self, parts: Vec<UploadPart>) -> Self {
        self.parts = parts;
        self
    }

    /// Add a request header, e.g. `x-oss-callback`
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
    #[tracing::instrument(skip_all, level = "debug", name = "complete-multipart-upload")]
    pub async fn send(self) -> Result<CompleteMultipartUploadOutput, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        let upload_id = required(self.upload_id, "upload id")?;
        let mut parts = self.parts;
        parts.sort();
        let body = xml::to_string(&CompleteMultipartUpload { parts: &parts })?;
        let with_callback = self.options.get_header(header::CALLBACK).is_some();

        let req = Request::new(Method::POST, bucket, key)
            .param("uploadId", Some(upload_id))
            .body(body.into());
        let req = self.options.apply(req)?;

        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[200])?;
        let crc64 = resp.server_crc;
        let version_id = resp.header(header::VERSION_ID);
        let request_id = resp.request_id();
        let (result, callback_body) = if with_callback {
            (Default::default(), Some(resp.body.collect().await?))
        } else {
            (resp.xml::<CompleteMultipartUploadResult>().await?, None)
        };
        Ok(CompleteMultipartUploadOutput {
            result,
            callback_body,
            crc64,
            version_id,
            request_id,
        })
    }
}

/// Fluent builder for `AbortMultipartUpload`
#[derive(Debug)]
pub struct AbortMultipartUploadFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    key: Option<String>,
    upload_id: Option<String>,
    options: RequestOptions,
}

impl AbortMultipartUploadFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            key: None,
            upload_id: None,
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

    /// Upload id returned by `InitiateMultipartUpload`
    pub fn upload_id(mut self, upload_id: impl Into<String>) -> Self {
        self.upload_id = Some(upload_id.into());
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Send the request
    #[tracing::instrument(skip_all, level = "debug", name = "abort-multipart-upload")]
    pub async fn send(self) -> Result<(), Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        let upload_id = required(self.upload_id, "upload id")?;
        let req = Request::new(Method::DELETE, bucket, key).param("uploadId", Some(upload_id));
        let req = self.options.apply(req)?;

        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[204])
    }
}

/// Fluent builder for `ListParts`
#[derive(Debug)]
pub struct ListUploadedPartsFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    key: Option<String>,
    upload_id: Option<String>,
    max_parts: Option<u32>,
    part_number_marker: Option<u64>,
    options: RequestOptions,
}

impl ListUploadedPartsFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            key: None,
            upload_id: None,
            max_parts: None,
            part_number_marker: None,
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

    /// Upload id returned by `InitiateMultipartUpload`
    pub fn upload_id(mut self, upload_id: impl Into<String>) -> Self {
        self.upload_id = Some(upload_id.into());
        self
    }

    /// Page size
    pub fn max_parts(mut self, max_parts: u32) -> Self {
        self.max_parts = Some(max_parts);
        self
    }

    /// List parts after this part number
    pub fn part_number_marker(mut self, marker: u64) -> Self {
        self.part_number_marker = Some(marker);
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Send the request
    #[tracing::instrument(skip_all, level = "debug", name = "list-uploaded-parts")]
    pub async fn send(self) -> Result<ListUploadedPartsResult, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        let upload_id = required(self.upload_id, "upload id")?;
        let req = Request::new(Method::GET, bucket, key)
            .param("uploadId", Some(upload_id))
            .opt_param("max-parts", self.max_parts.map(|n| n.to_string()))
            .opt_param(
                "part-number-marker",
                self.part_number_marker.map(|n| n.to_string()),
            );
        let req = self.options.apply(req)?;

        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[200])?;
        resp.xml().await
    }
}

/// Fluent builder for `ListMultipartUploads`
#[derive(Debug)]
pub struct ListMultipartUploadsFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    prefix: Option<String>,
    delimiter: Option<String>,
    key_marker: Option<String>,
    upload_id_marker: Option<String>,
    max_uploads: Option<u32>,
    options: RequestOptions,
}

impl ListMultipartUploadsFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            prefix: None,
            delimiter: None,
            key_marker: None,
            upload_id_marker: None,
            max_uploads: None,
            options: RequestOptions::default(),
        }
    }

    /// Bucket name
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Only list uploads of keys starting with `prefix`
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Group keys sharing a prefix up to `delimiter`
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Start after this key
    pub fn key_marker(mut self, marker: impl Into<String>) -> Self {
        self.key_marker = Some(marker.into());
        self
    }

    /// Together with `key_marker`, start after this upload
    pub fn upload_id_marker(mut self, marker: impl Into<String>) -> Self {
        self.upload_id_marker = Some(marker.into());
        self
    }

    /// Page size, at most 1000
    pub fn max_uploads(mut self, max_uploads: u32) -> Self {
        self.max_uploads = Some(max_uploads);
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Send the request
    #[tracing::instrument(skip_all, level = "debug", name = "list-multipart-uploads")]
    pub async fn send(self) -> Result<ListMultipartUploadsResult, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let req = Request::new(Method::GET, bucket, "")
            .param("uploads", None)
            .opt_param("prefix", self.prefix)
            .opt_param("delimiter", self.delimiter)
            .opt_param("key-marker", self.key_marker)
            .opt_param("upload-id-marker", self.upload_id_marker)
            .opt_param("max-uploads", self.max_uploads.map(|n| n.to_string()))
            .param("encoding-type", Some("url".to_owned()));
        let req = self.options.apply(req)?;

        let resp = self.handle.conn.execute(req).await?;
        resp.check_status(&[200])?;
        resp.xml::<ListMultipartUploadsResult>()
            .await?
            .decode_keys()
    }
}
