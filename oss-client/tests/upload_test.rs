/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::{Arc, Mutex};
use std::time::Duration;

use oss_client::error::ErrorKind;
use oss_client::io::crc64;
use oss_client::operation::upload::CheckpointConfig;
use oss_client::progress::{ProgressEvent, ProgressEventKind, ProgressFn};
use oss_client::operation::RequestOptions;
use test_common::{
    complete_response, create_test_file, init_logging, initiate_response, is_abort, is_complete,
    is_initiate, is_upload_part, mock_client, mock_client_with, test_data, upload_part_response,
    MockResponse, MockTransport, Rule, TEST_BUCKET,
};

const MIB: usize = 1024 * 1024;
const UPLOAD_ID: &str = "test-upload-id";

fn multipart_transport(key: &'static str) -> MockTransport {
    MockTransport::new()
        .with_rule(Rule::when(is_initiate).then_response(initiate_response(UPLOAD_ID, key)))
        .with_rule(Rule::when(is_upload_part).then(upload_part_response))
        .with_rule(Rule::when(is_complete).then_response(complete_response(key)))
        .with_rule(Rule::when(is_abort).then_response(MockResponse::new(204)))
}

fn part_numbers(transport: &MockTransport) -> Vec<u64> {
    let mut parts: Vec<u64> = transport
        .requests()
        .iter()
        .filter(|r| is_upload_part(r))
        .filter_map(|r| r.part_number())
        .collect();
    parts.sort();
    parts
}

#[tokio::test]
async fn test_multipart_upload_success() {
    init_logging();
    let data = test_data(5 * MIB);
    let file = create_test_file(&data);
    let transport = Arc::new(multipart_transport("big.bin"));
    let client = mock_client(transport.clone());

    let handle = client
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("big.bin")
        .file_path(file.path())
        .part_size(MIB as u64)
        .concurrency(3)
        .send()
        .await
        .unwrap();
    let output = handle.join().await.unwrap();

    assert_eq!(UPLOAD_ID, output.upload_id);
    assert_eq!("\"complete-etag\"", output.etag);
    assert_eq!(1, transport.count(is_initiate));
    assert_eq!(5, transport.count(is_upload_part));
    assert_eq!(1, transport.count(is_complete));
    assert_eq!(0, transport.count(is_abort));
    assert_eq!(vec![1, 2, 3, 4, 5], part_numbers(&transport));

    // every part carries its own slice of the file
    for req in transport.requests().iter().filter(|r| is_upload_part(r)) {
        let n = req.part_number().unwrap() as usize;
        assert_eq!(&data[(n - 1) * MIB..n * MIB], &req.body[..]);
    }

    let complete = transport
        .requests()
        .into_iter()
        .find(|r| is_complete(r))
        .unwrap();
    let body = complete.body_str();
    let positions: Vec<usize> = (1..=5)
        .map(|n| body.find(&format!("<PartNumber>{n}</PartNumber>")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(body.contains("etag-3"));
}

#[tokio::test]
async fn test_multipart_upload_part_failure_aborts() {
    init_logging();
    let file = create_test_file(&test_data(5 * MIB));
    let transport = Arc::new(
        MockTransport::new()
            .with_rule(
                Rule::when(|r| is_upload_part(r) && r.part_number() == Some(3)).then_response(
                    MockResponse::service_error(500, "InternalError", "part upload failed"),
                ),
            )
            .with_rule(Rule::when(is_initiate).then_response(initiate_response(UPLOAD_ID, "big.bin")))
            .with_rule(Rule::when(is_upload_part).then(upload_part_response))
            .with_rule(Rule::when(is_complete).then_response(complete_response("big.bin")))
            .with_rule(Rule::when(is_abort).then_response(MockResponse::new(204))),
    );
    let client = mock_client(transport.clone());

    let err = client
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("big.bin")
        .file_path(file.path())
        .part_size(MIB as u64)
        .concurrency(3)
        .send()
        .await
        .unwrap()
        .join()
        .await
        .unwrap_err();

    assert_eq!(&ErrorKind::ServiceError, err.kind());
    assert_eq!(Some(500), err.status_code());
    assert_eq!(1, transport.count(is_abort));
    assert_eq!(0, transport.count(is_complete));
}

#[tokio::test]
async fn test_resume_from_checkpoint() {
    init_logging();
    let data = test_data(10 * MIB);
    let file = create_test_file(&data);
    let cp_dir = tempfile::tempdir().unwrap();
    let checkpoint = CheckpointConfig::enabled().dir(cp_dir.path());

    // first attempt stops after two parts
    let first = Arc::new(
        MockTransport::new()
            .with_rule(
                Rule::when(|r| is_upload_part(r) && r.part_number() == Some(3))
                    .then_response(MockResponse::service_error(503, "ServiceUnavailable", "try later")),
            )
            .with_rule(Rule::when(is_initiate).then_response(initiate_response(UPLOAD_ID, "resume.bin")))
            .with_rule(Rule::when(is_upload_part).then(upload_part_response)),
    );
    let err = mock_client(first.clone())
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("resume.bin")
        .file_path(file.path())
        .part_size(2 * MIB as u64)
        .concurrency(1)
        .checkpoint(checkpoint.clone())
        .send()
        .await
        .unwrap()
        .join()
        .await
        .unwrap_err();
    assert_eq!(Some(503), err.status_code());
    assert_eq!(vec![1, 2, 3], part_numbers(&first));
    // resumable uploads are left in place for the next attempt
    assert_eq!(0, first.count(is_abort));
    assert_eq!(1, std::fs::read_dir(cp_dir.path()).unwrap().count());

    let second = Arc::new(multipart_transport("resume.bin"));
    let output = mock_client(second.clone())
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("resume.bin")
        .file_path(file.path())
        .part_size(2 * MIB as u64)
        .concurrency(2)
        .checkpoint(checkpoint)
        .send()
        .await
        .unwrap()
        .join()
        .await
        .unwrap();

    assert_eq!(UPLOAD_ID, output.upload_id);
    assert_eq!(0, second.count(is_initiate));
    assert_eq!(vec![3, 4, 5], part_numbers(&second));
    let complete = second
        .requests()
        .into_iter()
        .find(|r| is_complete(r))
        .unwrap();
    let body = complete.body_str();
    let positions: Vec<usize> = (1..=5)
        .map(|n| body.find(&format!("<PartNumber>{n}</PartNumber>")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(body.contains("etag-1"));

    // a finished upload leaves no checkpoint behind
    assert_eq!(0, std::fs::read_dir(cp_dir.path()).unwrap().count());
}

#[tokio::test]
async fn test_changed_file_invalidates_checkpoint() {
    let file = create_test_file(&test_data(MIB));
    let cp_dir = tempfile::tempdir().unwrap();
    let checkpoint = CheckpointConfig::enabled().dir(cp_dir.path());

    let first = Arc::new(
        MockTransport::new()
            .with_rule(Rule::when(is_initiate).then_response(initiate_response("first-id", "k")))
            .with_rule(
                Rule::when(is_upload_part)
                    .then_response(MockResponse::service_error(500, "InternalError", "boom")),
            ),
    );
    let result = mock_client(first)
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("k")
        .file_path(file.path())
        .part_size(512 * 1024)
        .checkpoint(checkpoint.clone())
        .send()
        .await
        .unwrap()
        .join()
        .await;
    assert!(result.is_err());

    std::fs::write(file.path(), test_data(MIB + 1)).unwrap();

    let second = Arc::new(
        MockTransport::new()
            .with_rule(Rule::when(is_initiate).then_response(initiate_response("second-id", "k")))
            .with_rule(Rule::when(is_upload_part).then(upload_part_response))
            .with_rule(Rule::when(is_complete).then_response(complete_response("k"))),
    );
    let output = mock_client(second.clone())
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("k")
        .file_path(file.path())
        .part_size(512 * 1024)
        .checkpoint(checkpoint)
        .send()
        .await
        .unwrap()
        .join()
        .await
        .unwrap();
    assert_eq!("second-id", output.upload_id);
    assert_eq!(1, second.count(is_initiate));
    assert_eq!(3, second.count(is_upload_part));
}

#[tokio::test]
async fn test_complete_not_found_removes_checkpoint() {
    let file = create_test_file(&test_data(200 * 1024));
    let cp_dir = tempfile::tempdir().unwrap();
    let cp_path = cp_dir.path().join("upload.cp");

    let transport = Arc::new(
        MockTransport::new()
            .with_rule(Rule::when(is_initiate).then_response(initiate_response(UPLOAD_ID, "k")))
            .with_rule(Rule::when(is_upload_part).then(upload_part_response))
            .with_rule(Rule::when(is_complete).then_response(MockResponse::service_error(
                404,
                "NoSuchUpload",
                "The specified upload does not exist.",
            ))),
    );
    let err = mock_client(transport.clone())
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("k")
        .file_path(file.path())
        .part_size(100 * 1024)
        .checkpoint(CheckpointConfig::enabled().file_path(&cp_path))
        .send()
        .await
        .unwrap()
        .join()
        .await
        .unwrap_err();

    assert_eq!("NoSuchUpload", err.as_service_error().unwrap().code);
    assert!(!cp_path.exists());
    assert_eq!(0, transport.count(is_abort));
}

#[tokio::test]
async fn test_complete_crc_mismatch() {
    let data = test_data(300 * 1024);
    let file = create_test_file(&data);
    let transport = Arc::new(
        MockTransport::new()
            .with_rule(Rule::when(is_initiate).then_response(initiate_response(UPLOAD_ID, "k")))
            .with_rule(Rule::when(is_upload_part).then(upload_part_response))
            .with_rule(
                Rule::when(is_complete)
                    .then_response(complete_response("k").header("x-oss-hash-crc64ecma", "42")),
            )
            .with_rule(Rule::when(is_abort).then_response(MockResponse::new(204))),
    );

    let err = mock_client(transport.clone())
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("k")
        .file_path(file.path())
        .part_size(100 * 1024)
        .send()
        .await
        .unwrap()
        .join()
        .await
        .unwrap_err();

    let crc_err = err.as_crc_error().unwrap();
    assert_eq!(crc64::checksum(&data), crc_err.client_crc);
    assert_eq!(42, crc_err.server_crc);
    assert_eq!(1, transport.count(is_abort));
}

#[tokio::test]
async fn test_upload_progress_events() {
    let data = test_data(3 * MIB);
    let file = create_test_file(&data);
    let transport = Arc::new(multipart_transport("p.bin"));
    let client = mock_client_with(transport, |b| b.crc(false));

    let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let sink = events.clone();
    let listener = Arc::new(ProgressFn(move |e: &ProgressEvent| {
        sink.lock().unwrap().push(e.clone())
    }));

    client
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("p.bin")
        .file_path(file.path())
        .part_size(MIB as u64)
        .options(RequestOptions::new().progress_listener(listener))
        .send()
        .await
        .unwrap()
        .join()
        .await
        .unwrap();

    let events = events.lock().unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        vec![
            ProgressEventKind::Started,
            ProgressEventKind::Data,
            ProgressEventKind::Data,
            ProgressEventKind::Data,
            ProgressEventKind::Completed,
        ],
        kinds
    );
    assert!(events.iter().all(|e| e.total_bytes == Some(3 * MIB as u64)));
    assert_eq!(3 * MIB as u64, events.last().unwrap().consumed_bytes);
}

#[tokio::test]
async fn test_abort_handle() {
    let file = create_test_file(&test_data(MIB));
    let transport = Arc::new(
        MockTransport::new()
            .with_rule(Rule::when(is_initiate).then_response(initiate_response(UPLOAD_ID, "k")))
            .with_rule(Rule::when(is_upload_part).then(|req| {
                upload_part_response(req).delay(Duration::from_secs(60))
            }))
            .with_rule(Rule::when(is_abort).then_response(MockResponse::new(204))),
    );
    let client = mock_client(transport.clone());

    let handle = client
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("k")
        .file_path(file.path())
        .part_size(MIB as u64)
        .send()
        .await
        .unwrap();
    assert_eq!(UPLOAD_ID, handle.upload_id());
    let outcome = tokio::time::timeout(Duration::from_secs(10), handle.abort())
        .await
        .expect("abort waits for the stalled parts")
        .unwrap();
    assert!(outcome.is_none(), "{outcome:?}");
    assert_eq!(1, transport.count(is_abort));
    assert_eq!(0, transport.count(is_complete));
}

#[tokio::test]
async fn test_upload_requires_file() {
    let transport = Arc::new(MockTransport::new());
    let err = mock_client(transport.clone())
        .upload_file()
        .bucket(TEST_BUCKET)
        .key("k")
        .file_path("/definitely/not/here.bin")
        .send()
        .await
        .unwrap_err();
    assert_eq!(&ErrorKind::IOError, err.kind());
    assert!(transport.requests().is_empty());
}
