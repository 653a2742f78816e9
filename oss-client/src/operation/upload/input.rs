/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::path::PathBuf;

use crate::http::header;
use crate::operation::upload::CheckpointConfig;
use crate::operation::RequestOptions;
use crate::progress::SharedProgressListener;
use crate::types::StorageClass;

/// Everything needed to drive one file upload, validated by the fluent builder
#[derive(Debug)]
pub(crate) struct UploadInput {
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) file_path: PathBuf,
    pub(crate) part_size: u64,
    pub(crate) num_workers: usize,
    pub(crate) checkpoint: CheckpointConfig,
    pub(crate) content_type: Option<String>,
    pub(crate) storage_class: Option<StorageClass>,
    /// Headers and parameters for `InitiateMultipartUpload`, minus the callback headers
    pub(crate) initiate_options: RequestOptions,
    /// `x-oss-callback` and `x-oss-callback-var`, sent with `CompleteMultipartUpload`
    pub(crate) callback: Callback,
    /// Observer of whole-file progress
    pub(crate) listener: Option<SharedProgressListener>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Callback {
    pub(crate) value: Option<String>,
    pub(crate) var: Option<String>,
}

impl Callback {
    pub(crate) fn options(&self) -> RequestOptions {
        let mut options = RequestOptions::new();
        if let Some(value) = &self.value {
            options = options.header(header::CALLBACK, value.clone());
        }
        if let Some(var) = &self.var {
            options = options.header(header::CALLBACK_VAR, var.clone());
        }
        options
    }
}
