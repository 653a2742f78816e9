/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::ops::Deref;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::Handle;
use crate::operation::upload::input::UploadInput;

/// Internal context used to drive a single upload
#[derive(Debug, Clone)]
pub(crate) struct UploadContext {
    /// reference to client handle used to do actual work
    pub(crate) handle: Arc<Handle>,
    /// the multipart upload ID
    pub(crate) upload_id: String,
    /// the original request
    pub(crate) request: Arc<UploadInput>,
    /// cancels the upload, requests in flight included
    pub(crate) cancel: CancellationToken,
}

impl UploadContext {
    /// The original request
    pub(crate) fn request(&self) -> &UploadInput {
        self.request.deref()
    }
}
