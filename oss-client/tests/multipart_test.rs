/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use oss_client::error::ErrorKind;
use oss_client::types::StorageClass;
use oss_client::xml::UploadPart;
use test_common::{
    complete_response, init_logging, initiate_response, is_abort, is_complete, is_initiate,
    is_upload_part, mock_client, upload_part_response, MockResponse, MockTransport, Rule,
    TEST_BUCKET,
};

#[tokio::test]
async fn test_initiate_guesses_content_type() {
    init_logging();
    let transport = Arc::new(
        MockTransport::new()
            .with_rule(Rule::when(is_initiate).then_response(initiate_response("id-1", "a.json"))),
    );
    let client = mock_client(transport.clone());

    let result = client
        .initiate_multipart_upload()
        .bucket(TEST_BUCKET)
        .key("a.json")
        .storage_class(StorageClass::IA)
        .send()
        .await
        .unwrap();
    assert_eq!("id-1", result.upload_id);
    assert_eq!("a.json", result.key);

    let requests = transport.requests();
    assert_eq!(1, requests.len());
    let req = &requests[0];
    assert_eq!(Some(String::new()), req.param("uploads"));
    assert_eq!(Some("application/json"), req.header("content-type"));
    assert_eq!(Some("IA"), req.header("x-oss-storage-class"));
}

#[tokio::test]
async fn test_upload_part_number_out_of_range() {
    let transport = Arc::new(MockTransport::new());
    let client = mock_client(transport.clone());

    for part_number in [0, 10_001] {
        let err = client
            .upload_part()
            .bucket(TEST_BUCKET)
            .key("a.bin")
            .upload_id("id-1")
            .part_number(part_number)
            .body("data".into())
            .send()
            .await
            .unwrap_err();
        assert_eq!(&ErrorKind::InputInvalid, err.kind());
    }
    assert_eq!(0, transport.requests().len());
}

#[tokio::test]
async fn test_upload_part_returns_etag() {
    let transport = Arc::new(
        MockTransport::new().with_rule(Rule::when(is_upload_part).then(upload_part_response)),
    );
    let client = mock_client(transport.clone());

    let output = client
        .upload_part()
        .bucket(TEST_BUCKET)
        .key("a.bin")
        .upload_id("id-1")
        .part_number(7)
        .body("part seven".into())
        .send()
        .await
        .unwrap();
    assert_eq!(7, output.part.part_number);
    assert_eq!("\"etag-7\"", output.part.etag);
    assert_eq!("mock-request-id", output.request_id);

    let req = &transport.requests()[0];
    assert_eq!(Some("id-1".to_owned()), req.param("uploadId"));
    assert_eq!("part seven", req.body_str());
}

#[tokio::test]
async fn test_complete_sorts_parts() {
    let transport = Arc::new(
        MockTransport::new().with_rule(Rule::when(is_complete).then_response(complete_response("a.bin"))),
    );
    let client = mock_client(transport.clone());

    let part = |n: u64| UploadPart {
        part_number: n,
        etag: format!("etag-{n}"),
    };
    let output = client
        .complete_multipart_upload()
        .bucket(TEST_BUCKET)
        .key("a.bin")
        .upload_id("id-1")
        .set_parts(vec![part(3), part(1), part(2)])
        .send()
        .await
        .unwrap();
    assert!(output.result.etag.contains("complete-etag"));
    assert!(output.callback_body.is_none());

    let body = transport.requests()[0].body_str().to_owned();
    let first = body.find("etag-1").unwrap();
    let second = body.find("etag-2").unwrap();
    let third = body.find("etag-3").unwrap();
    assert!(first < second && second < third, "{body}");
}

#[tokio::test]
async fn test_complete_with_callback_returns_raw_body() {
    let transport = Arc::new(MockTransport::new().with_rule(
        Rule::when(is_complete).then_response(MockResponse::ok().body("{\"Status\":\"OK\"}")),
    ));
    let client = mock_client(transport.clone());

    let output = client
        .complete_multipart_upload()
        .bucket(TEST_BUCKET)
        .key("a.bin")
        .upload_id("id-1")
        .part(UploadPart {
            part_number: 1,
            etag: "etag-1".to_owned(),
        })
        .header("x-oss-callback", "eyJjYWxsYmFja1VybCI6ICJleGFtcGxlLmNvbSJ9")
        .send()
        .await
        .unwrap();
    assert_eq!(
        Some(&b"{\"Status\":\"OK\"}"[..]),
        output.callback_body.as_deref()
    );
    assert_eq!(
        Some("eyJjYWxsYmFja1VybCI6ICJleGFtcGxlLmNvbSJ9"),
        transport.requests()[0].header("x-oss-callback")
    );
}

#[tokio::test]
async fn test_abort_expects_no_content() {
    let transport = Arc::new(
        MockTransport::new()
            .with_rule(Rule::when(is_abort).then_response(MockResponse::new(204)).times(1))
            .with_rule(Rule::when(is_abort).then_response(MockResponse::ok())),
    );
    let client = mock_client(transport.clone());
    let abort = || {
        client
            .abort_multipart_upload()
            .bucket(TEST_BUCKET)
            .key("a.bin")
            .upload_id("id-1")
            .send()
    };

    abort().await.unwrap();
    let err = abort().await.unwrap_err();
    assert_eq!(&ErrorKind::UnexpectedStatusCode, err.kind());
    assert_eq!(Some(200), err.status_code());
}

#[tokio::test]
async fn test_list_multipart_uploads_decodes_keys() {
    let body = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<ListMultipartUploadsResult>
  <Bucket>test-bucket</Bucket>
  <EncodingType>url</EncodingType>
  <KeyMarker></KeyMarker>
  <UploadIdMarker></UploadIdMarker>
  <NextKeyMarker>dir%2Fb%2Bc.bin</NextKeyMarker>
  <NextUploadIdMarker>id-2</NextUploadIdMarker>
  <Prefix>dir%2F</Prefix>
  <MaxUploads>1000</MaxUploads>
  <IsTruncated>false</IsTruncated>
  <Upload>
    <Key>dir%2Fa%20b.bin</Key>
    <UploadId>id-1</UploadId>
    <Initiated>2024-01-01T00:00:00.000Z</Initiated>
  </Upload>
  <Upload>
    <Key>dir%2Fb%2Bc.bin</Key>
    <UploadId>id-2</UploadId>
    <Initiated>2024-01-02T00:00:00.000Z</Initiated>
  </Upload>
</ListMultipartUploadsResult>";
    let transport = Arc::new(MockTransport::new().with_rule(
        Rule::when(|r| r.method == http::Method::GET && r.has_param("uploads"))
            .then_response(MockResponse::ok().body(body)),
    ));
    let client = mock_client(transport.clone());

    let result = client
        .list_multipart_uploads()
        .bucket(TEST_BUCKET)
        .prefix("dir/")
        .send()
        .await
        .unwrap();
    assert_eq!("dir/", result.prefix);
    assert_eq!("dir/b+c.bin", result.next_key_marker);
    let keys: Vec<_> = result.uploads.iter().map(|u| u.key.as_str()).collect();
    assert_eq!(vec!["dir/a b.bin", "dir/b+c.bin"], keys);

    let req = &transport.requests()[0];
    assert_eq!(Some("dir/".to_owned()), req.param("prefix"));
    assert_eq!(Some("url".to_owned()), req.param("encoding-type"));
}
