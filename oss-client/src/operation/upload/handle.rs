/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::conn;
use crate::error::{Error, ErrorKind};
use crate::operation::multipart::{
    AbortMultipartUploadFluentBuilder, CompleteMultipartUploadFluentBuilder,
};
use crate::operation::upload::checkpoint::Checkpoint;
use crate::operation::upload::context::UploadContext;
use crate::operation::upload::UploadOutput;

/// Response type for a single file upload.
///
/// # Cancellation
///
/// [`Self::abort`] stops the part workers and cancels the requests in flight. Without a
/// checkpoint the multipart upload is then aborted on the service, with a checkpoint it is
/// left in place so a later upload can resume it.
///
/// Dropping the handle does not stop the upload, it keeps running in the background.
#[derive(Debug)]
#[non_exhaustive]
pub struct UploadHandle {
    task: JoinHandle<Result<UploadOutput, Error>>,
    /// The context used to drive an upload to completion
    pub(crate) ctx: UploadContext,
}

impl UploadHandle {
    pub(crate) fn new(ctx: UploadContext, task: JoinHandle<Result<UploadOutput, Error>>) -> Self {
        Self { task, ctx }
    }

    /// Id of the multipart upload
    pub fn upload_id(&self) -> &str {
        &self.ctx.upload_id
    }

    /// Consume the handle and wait for upload to complete
    #[tracing::instrument(skip_all, level = "debug", name = "join-upload")]
    pub async fn join(self) -> Result<UploadOutput, Error> {
        self.task.await?
    }

    /// Abort the upload and cancel any in-progress part uploads.
    ///
    /// Returns the outcome of the upload when it finished before it could be stopped.
    #[tracing::instrument(skip_all, level = "debug", name = "abort-upload")]
    pub async fn abort(self) -> Result<Option<UploadOutput>, Error> {
        self.ctx.cancel.cancel();
        match self.task.await? {
            Ok(output) => Ok(Some(output)),
            Err(err) if err.kind() == &ErrorKind::OperationCancelled => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Abort the multipart upload on the service. Failures are logged, the upload already failed.
pub(super) async fn abort_upload(ctx: &UploadContext) {
    let result = AbortMultipartUploadFluentBuilder::new(ctx.handle.clone())
        .bucket(ctx.request().bucket.clone())
        .key(ctx.request().key.clone())
        .upload_id(ctx.upload_id.clone())
        .send()
        .instrument(tracing::debug_span!("send-abort-multipart-upload"))
        .await;
    match result {
        Ok(()) => tracing::debug!(upload_id = %ctx.upload_id, "aborted multipart upload"),
        Err(err) => tracing::error!(upload_id = %ctx.upload_id, "failed to abort upload: {err}"),
    }
}

/// Assemble the uploaded parts, checking the object CRC64 against the part checksums
pub(super) async fn complete_upload(
    ctx: &UploadContext,
    record: &Checkpoint,
) -> Result<UploadOutput, Error> {
    let options = ctx
        .request()
        .callback
        .options()
        .cancellation_token(ctx.cancel.clone());
    let resp = CompleteMultipartUploadFluentBuilder::new(ctx.handle.clone())
        .bucket(ctx.request().bucket.clone())
        .key(ctx.request().key.clone())
        .upload_id(ctx.upload_id.clone())
        .set_parts(record.upload_parts())
        .options(options)
        .send()
        .instrument(tracing::debug_span!("send-complete-multipart-upload"))
        .await?;

    if ctx.handle.config().crc_enabled() {
        conn::check_crc(
            Some(record.combined_crc64()),
            resp.crc64,
            "CompleteMultipartUpload",
            &resp.request_id,
        )?;
    }

    Ok(UploadOutput {
        bucket: ctx.request().bucket.clone(),
        key: ctx.request().key.clone(),
        upload_id: ctx.upload_id.clone(),
        etag: resp.result.etag,
        location: resp.result.location,
        version_id: resp.version_id,
        crc64: resp.crc64,
        callback_body: resp.callback_body,
        request_id: resp.request_id,
    })
}
