/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::{service_fn, Service, ServiceBuilder, ServiceExt};
use tracing::Instrument;

use crate::error::Error;
use crate::io::crc64;
use crate::io::part_reader::read_chunk;
use crate::io::{FileChunk, InputStream};
use crate::operation::multipart::UploadPartFluentBuilder;
use crate::operation::upload::context::UploadContext;
use crate::operation::RequestOptions;
use crate::xml::UploadPart;

/// Request/input type for our "upload_part" service.
#[derive(Debug, Clone)]
pub(super) struct UploadPartRequest {
    pub(super) ctx: UploadContext,
    pub(super) chunk: FileChunk,
}

/// A part the service accepted
#[derive(Debug, Clone)]
pub(super) struct CompletedPart {
    pub(super) part: UploadPart,
    pub(super) size: u64,
    /// CRC64 of the part content, computed locally
    pub(super) crc64: u64,
}

/// handler (service fn) for a single part
async fn upload_part_handler(request: UploadPartRequest) -> Result<CompletedPart, Error> {
    let ctx = request.ctx;
    let chunk = request.chunk;
    let part = read_chunk(ctx.request().file_path.clone(), chunk).await?;
    let crc64 = crc64::checksum(&part.data);

    let resp = UploadPartFluentBuilder::new(ctx.handle.clone())
        .bucket(ctx.request().bucket.clone())
        .key(ctx.request().key.clone())
        .upload_id(ctx.upload_id.clone())
        .part_number(part.part_number)
        .body(InputStream::from(part.data))
        .options(RequestOptions::new().cancellation_token(ctx.cancel.clone()))
        .send()
        .instrument(tracing::debug_span!("send-upload-part", part_number = chunk.number))
        .await?;

    tracing::trace!("completed upload of part number {}", chunk.number);
    Ok(CompletedPart {
        part: resp.part,
        size: chunk.size,
        crc64,
    })
}

/// Create a new tower::Service for uploading individual parts
pub(super) fn upload_part_service(
    ctx: &UploadContext,
) -> impl Service<UploadPartRequest, Response = CompletedPart, Error = Error, Future: Send>
       + Clone
       + Send {
    let svc = service_fn(upload_part_handler);
    ServiceBuilder::new()
        .concurrency_limit(ctx.request().num_workers)
        .service(svc)
}

/// Spawn a scheduler feeding `chunks` to the part workers and the workers themselves.
///
/// Every part that was started reports exactly one result on the returned channel, which
/// closes once all tasks are done. Cancelling `stop` keeps further parts from being started,
/// a failing part cancels it.
pub(super) fn distribute_work(
    ctx: &UploadContext,
    chunks: Vec<FileChunk>,
    stop: CancellationToken,
) -> (
    JoinSet<()>,
    async_channel::Receiver<Result<CompletedPart, Error>>,
) {
    let n_workers = ctx.request().num_workers.max(1);
    let (work_tx, work_rx) = async_channel::bounded::<FileChunk>(n_workers);
    let (result_tx, result_rx) = async_channel::unbounded();
    let mut tasks = JoinSet::new();

    let scheduler_stop = stop.clone();
    tasks.spawn(
        async move {
            for chunk in chunks {
                tokio::select! {
                    _ = scheduler_stop.cancelled() => break,
                    sent = work_tx.send(chunk) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::trace!("all parts scheduled");
        }
        .instrument(tracing::debug_span!("schedule-parts")),
    );

    let svc = upload_part_service(ctx);
    for i in 0..n_workers {
        let worker = upload_parts(
            ctx.clone(),
            svc.clone(),
            work_rx.clone(),
            result_tx.clone(),
            stop.clone(),
        );
        tasks.spawn(worker.instrument(tracing::debug_span!("upload-part-worker", worker = i)));
    }
    tracing::trace!("work distributed for uploading parts");

    (tasks, result_rx)
}

async fn upload_parts(
    ctx: UploadContext,
    svc: impl Service<UploadPartRequest, Response = CompletedPart, Error = Error, Future: Send>
        + Clone
        + Send
        + 'static,
    work_rx: async_channel::Receiver<FileChunk>,
    result_tx: async_channel::Sender<Result<CompletedPart, Error>>,
    stop: CancellationToken,
) {
    loop {
        let chunk = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            chunk = work_rx.recv() => match chunk {
                Ok(chunk) => chunk,
                Err(_) => break,
            },
        };

        let req = UploadPartRequest {
            ctx: ctx.clone(),
            chunk,
        };
        let result = svc.clone().oneshot(req).await;
        if result.is_err() {
            stop.cancel();
        }
        if result_tx.send(result).await.is_err() {
            break;
        }
    }
}
