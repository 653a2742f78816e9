/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/// Operation builders
pub mod builders;
mod checkpoint;
mod context;
mod handle;
mod input;
mod service;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::client::Handle;
use crate::error::{self, Error, ErrorKind};
use crate::io::plan_parts;
use crate::operation::multipart::InitiateMultipartUploadFluentBuilder;
use crate::progress::{publish, ProgressEvent, ProgressEventKind};
pub use builders::UploadFluentBuilder;
use checkpoint::{Checkpoint, SourceFile};
pub use checkpoint::CheckpointConfig;
use context::UploadContext;
pub use handle::UploadHandle;
use input::UploadInput;
use service::distribute_work;

/// Result of a completed upload
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct UploadOutput {
    /// Bucket name
    pub bucket: String,
    /// Object key
    pub key: String,
    /// Id of the multipart upload the object was assembled from
    pub upload_id: String,
    /// ETag of the object. Empty when a callback was requested.
    pub etag: String,
    /// URL of the object. Empty when a callback was requested.
    pub location: String,
    /// Version id of the object
    pub version_id: Option<String>,
    /// CRC64 of the object as reported by the service
    pub crc64: Option<u64>,
    /// Body returned by the callback server
    pub callback_body: Option<Bytes>,
    /// Request id of the `CompleteMultipartUpload`
    pub request_id: String,
}

/// Operation struct for a multipart upload of a local file
#[derive(Clone, Default, Debug)]
pub(crate) struct Upload;

impl Upload {
    /// Plan the upload, initiate it or pick up a checkpointed one and start the part workers
    pub(crate) async fn orchestrate(
        handle: Arc<Handle>,
        input: UploadInput,
        cancel: CancellationToken,
    ) -> Result<UploadHandle, Error> {
        let source = SourceFile::open(&input.file_path, input.checkpoint.is_enabled()).await?;
        let checkpoint_path = input
            .checkpoint
            .path_for(&source.path, &input.bucket, &input.key);

        let record = match &checkpoint_path {
            Some(path) => resume_or_prepare(&handle, &input, &source, path, &cancel).await?,
            None => prepare(&handle, &input, &source, &cancel).await?,
        };

        let ctx = UploadContext {
            handle,
            upload_id: record.upload_id.clone(),
            request: Arc::new(input),
            cancel,
        };
        let task = tokio::spawn(
            run(ctx.clone(), record, checkpoint_path).instrument(tracing::debug_span!(
                "upload-file",
                upload_id = %ctx.upload_id
            )),
        );
        Ok(UploadHandle::new(ctx, task))
    }
}

/// Start a new multipart upload with every part pending
async fn prepare(
    handle: &Arc<Handle>,
    input: &UploadInput,
    source: &SourceFile,
    cancel: &CancellationToken,
) -> Result<Checkpoint, Error> {
    let chunks = plan_parts(source.stat.size, input.part_size)?;
    let mut initiate = InitiateMultipartUploadFluentBuilder::new(handle.clone())
        .bucket(input.bucket.clone())
        .key(input.key.clone())
        .options(
            input
                .initiate_options
                .clone()
                .cancellation_token(cancel.clone()),
        );
    if let Some(content_type) = &input.content_type {
        initiate = initiate.content_type(content_type.clone());
    }
    if let Some(class) = &input.storage_class {
        initiate = initiate.storage_class(class.clone());
    }
    let result = initiate
        .send()
        .instrument(tracing::debug_span!("send-initiate-multipart-upload"))
        .await?;
    tracing::debug!(
        upload_id = %result.upload_id,
        parts = chunks.len(),
        "initiated multipart upload"
    );

    Ok(Checkpoint::new(
        source,
        &input.bucket,
        &input.key,
        result.upload_id,
        &chunks,
        &input.callback,
    ))
}

/// Load the checkpoint at `path` if it still describes this upload, otherwise start over and
/// record the new upload there
async fn resume_or_prepare(
    handle: &Arc<Handle>,
    input: &UploadInput,
    source: &SourceFile,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<Checkpoint, Error> {
    match Checkpoint::load(path).await {
        Ok(record) if record.is_valid(source, &input.bucket, &input.key, &input.callback) => {
            tracing::debug!(
                path = %path.display(),
                upload_id = %record.upload_id,
                "resuming upload from checkpoint"
            );
            return Ok(record);
        }
        Ok(_) => tracing::debug!(path = %path.display(), "discarding stale checkpoint"),
        Err(err) => tracing::trace!(path = %path.display(), "no usable checkpoint: {err}"),
    }
    Checkpoint::remove(path).await;

    let mut record = prepare(handle, input, source, cancel).await?;
    record.dump(path).await?;
    Ok(record)
}

/// Upload the pending parts and assemble the object, reporting whole-file progress
async fn run(
    ctx: UploadContext,
    mut record: Checkpoint,
    checkpoint_path: Option<PathBuf>,
) -> Result<UploadOutput, Error> {
    let listener = ctx.request().listener.clone();
    let total = record.file_stat.size;
    let mut progress = PartProgress {
        consumed: record.completed_bytes(),
        total,
    };
    publish(
        listener.as_ref(),
        ProgressEvent::new(ProgressEventKind::Started, progress.consumed, Some(total), 0),
    );

    let result = upload_and_complete(&ctx, &mut record, checkpoint_path.as_deref(), &mut progress).await;

    let kind = match &result {
        Ok(_) => ProgressEventKind::Completed,
        Err(_) => ProgressEventKind::Failed,
    };
    publish(
        listener.as_ref(),
        ProgressEvent::new(kind, progress.consumed, Some(total), 0),
    );
    result
}

#[derive(Debug)]
struct PartProgress {
    consumed: u64,
    total: u64,
}

async fn upload_and_complete(
    ctx: &UploadContext,
    record: &mut Checkpoint,
    checkpoint_path: Option<&Path>,
    progress: &mut PartProgress,
) -> Result<UploadOutput, Error> {
    if let Err(err) = upload_parts(ctx, record, checkpoint_path, progress).await {
        if checkpoint_path.is_none() {
            handle::abort_upload(ctx).await;
        }
        return Err(err);
    }

    tracing::trace!("completing multipart upload");
    match handle::complete_upload(ctx, record).await {
        Ok(output) => {
            if let Some(path) = checkpoint_path {
                Checkpoint::remove(path).await;
            }
            tracing::trace!("upload completed successfully");
            Ok(output)
        }
        Err(err) => {
            match checkpoint_path {
                // the upload can no longer be completed, resuming would loop forever
                Some(path) if matches!(err.status_code(), Some(203) | Some(404)) => {
                    Checkpoint::remove(path).await
                }
                Some(_) => {}
                None => handle::abort_upload(ctx).await,
            }
            Err(err)
        }
    }
}

/// Upload every pending part, recording each one that succeeds.
///
/// The first failure stops scheduling new parts, parts already in flight are still awaited so
/// the record reflects everything the service accepted.
async fn upload_parts(
    ctx: &UploadContext,
    record: &mut Checkpoint,
    checkpoint_path: Option<&Path>,
    progress: &mut PartProgress,
) -> Result<(), Error> {
    let pending = record.pending_chunks();
    if pending.is_empty() {
        return Ok(());
    }

    let listener = ctx.request().listener.clone();
    let stop = ctx.cancel.child_token();
    let (mut tasks, results) = distribute_work(ctx, pending, stop.clone());

    let mut first_error = None;
    while let Ok(result) = results.recv().await {
        match result {
            Ok(completed) => {
                record.mark_completed(completed.part, completed.crc64);
                progress.consumed += completed.size;
                publish(
                    listener.as_ref(),
                    ProgressEvent::new(
                        ProgressEventKind::Data,
                        progress.consumed,
                        Some(progress.total),
                        completed.size,
                    ),
                );
                if let Some(path) = checkpoint_path {
                    if let Err(err) = record.dump(path).await {
                        tracing::warn!(path = %path.display(), "failed to write checkpoint: {err}");
                    }
                }
            }
            Err(err) if first_error.is_none() => {
                tracing::error!("multipart upload failed to upload a part, stopping: {err}");
                stop.cancel();
                first_error = Some(err);
            }
            Err(err) => tracing::debug!("part failed after the upload was stopped: {err}"),
        }
    }

    while let Some(joined) = tasks.join_next().await {
        joined?;
    }

    if let Some(err) = first_error {
        return Err(err);
    }
    if ctx.cancel.is_cancelled() {
        return Err(error::operation_cancelled());
    }
    if !record.all_completed() {
        return Err(Error::new(
            ErrorKind::RuntimeError,
            "part workers stopped before every part was uploaded",
        ));
    }
    Ok(())
}
