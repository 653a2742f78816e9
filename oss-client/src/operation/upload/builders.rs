/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::path::PathBuf;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;

use crate::client::Handle;
use crate::error::Error;
use crate::http::header;
use crate::operation::upload::input::{Callback, UploadInput};
use crate::operation::upload::{CheckpointConfig, Upload, UploadHandle};
use crate::operation::{guess_content_type, required, RequestOptions};
use crate::types::StorageClass;
use crate::MAX_CONCURRENCY;

/// Fluent builder for a concurrent multipart upload of a local file
#[derive(Debug)]
pub struct UploadFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    key: Option<String>,
    file_path: Option<PathBuf>,
    part_size: Option<u64>,
    concurrency: Option<usize>,
    checkpoint: CheckpointConfig,
    content_type: Option<String>,
    storage_class: Option<StorageClass>,
    options: RequestOptions,
}

impl UploadFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            key: None,
            file_path: None,
            part_size: None,
            concurrency: None,
            checkpoint: CheckpointConfig::default(),
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

    /// Local file to upload
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Part size in bytes, between 100 KiB and 5 GiB. Defaults to the client setting.
    pub fn part_size(mut self, part_size: u64) -> Self {
        self.part_size = Some(part_size);
        self
    }

    /// Number of parts uploaded in parallel, clipped to `[1, 100]`. Defaults to the client
    /// setting.
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = Some(workers);
        self
    }

    /// Persist progress so an interrupted upload can be resumed
    pub fn checkpoint(mut self, checkpoint: CheckpointConfig) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    /// `Content-Type` of the object. Guessed from the key or the file name when not set.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Storage class of the object
    pub fn storage_class(mut self, class: StorageClass) -> Self {
        self.storage_class = Some(class);
        self
    }

    /// Add a request header. `x-oss-callback` and `x-oss-callback-var` are sent when the
    /// upload is completed, everything else when it is initiated.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.header(name, value);
        self
    }

    /// Parameters, headers and behavioral options. The progress listener observes the whole
    /// file, the cancellation token stops the upload like [`UploadHandle::abort`] does.
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Initiate the upload, or pick up a checkpointed one, and start uploading parts
    #[tracing::instrument(skip_all, level = "debug", name = "upload")]
    pub async fn send(self) -> Result<UploadHandle, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        let file_path = self
            .file_path
            .ok_or_else(|| crate::error::invalid_input("file path is required"))?;

        let mut options = self.options;
        let callback = Callback {
            value: options.get_header(header::CALLBACK).map(str::to_owned),
            var: options.get_header(header::CALLBACK_VAR).map(str::to_owned),
        };
        options.headers.retain(|(name, _)| {
            !name.eq_ignore_ascii_case(header::CALLBACK)
                && !name.eq_ignore_ascii_case(header::CALLBACK_VAR)
        });
        let listener = options.listener.take();
        let cancel = match options.cancel.take() {
            Some(token) => token.child_token(),
            None => CancellationToken::new(),
        };

        let file_name = file_path.to_string_lossy().into_owned();
        let content_type = match self.content_type {
            Some(content_type) => Some(content_type),
            None if options.get_header(CONTENT_TYPE.as_str()).is_some() => None,
            None => guess_content_type([key.as_str(), file_name.as_str()]),
        };

        let input = UploadInput {
            bucket,
            key,
            file_path,
            part_size: self.part_size.unwrap_or_else(|| self.handle.part_size()),
            num_workers: self
                .concurrency
                .unwrap_or_else(|| self.handle.num_workers())
                .clamp(1, MAX_CONCURRENCY),
            checkpoint: self.checkpoint,
            content_type,
            storage_class: self.storage_class,
            initiate_options: options,
            callback,
            listener,
        };
        Upload::orchestrate(self.handle, input, cancel).await
    }
}
