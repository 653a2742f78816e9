/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{self, Error};
use crate::url::query_unescape;

pub(crate) fn from_bytes<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    Ok(quick_xml::de::from_reader(body)?)
}

pub(crate) fn to_string<T: Serialize>(value: &T) -> Result<String, Error> {
    quick_xml::se::to_string(value).map_err(error::invalid_input)
}

fn is_url_encoded(encoding_type: &Option<String>) -> bool {
    encoding_type.as_deref() == Some("url")
}

fn unescape_in_place(value: &mut String) -> Result<(), Error> {
    *value = query_unescape(value)?;
    Ok(())
}

/// Response to `InitiateMultipartUpload`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename = "InitiateMultipartUploadResult", rename_all = "PascalCase")]
pub struct InitiateMultipartUploadResult {
    /// Bucket name
    pub bucket: String,
    /// Object key
    pub key: String,
    /// Upload id identifying the multipart upload
    pub upload_id: String,
}

/// A part reference used to complete a multipart upload
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "PascalCase")]
pub struct UploadPart {
    /// 1-based part number
    pub part_number: u64,
    /// ETag returned when the part was uploaded
    #[serde(rename = "ETag")]
    pub etag: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "CompleteMultipartUpload")]
pub(crate) struct CompleteMultipartUpload<'a> {
    #[serde(rename = "Part")]
    pub(crate) parts: &'a [UploadPart],
}

/// Response to `CompleteMultipartUpload`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename = "CompleteMultipartUploadResult", rename_all = "PascalCase")]
pub struct CompleteMultipartUploadResult {
    /// URL of the object
    pub location: String,
    /// Bucket name
    pub bucket: String,
    /// Object key
    pub key: String,
    /// ETag of the assembled object
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Response to `CopyObject`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename = "CopyObjectResult", rename_all = "PascalCase")]
pub struct CopyObjectResult {
    /// Last modification time of the new object
    pub last_modified: String,
    /// ETag of the new object
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// An object to delete in a `DeleteObjects` request
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteObject {
    /// Object key
    pub key: String,
    /// Version to delete, the current version when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

impl DeleteObject {
    /// Delete the current version of `key`
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: None,
        }
    }

    /// Delete a specific version of `key`
    pub fn with_version(key: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: Some(version_id.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename = "Delete", rename_all = "PascalCase")]
pub(crate) struct Delete<'a> {
    pub(crate) quiet: bool,
    #[serde(rename = "Object")]
    pub(crate) objects: &'a [DeleteObject],
}

/// Response to `DeleteObjects`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename = "DeleteResult", rename_all = "PascalCase")]
pub struct DeleteObjectsResult {
    /// Keys that were deleted. Empty in quiet mode.
    #[serde(rename = "Deleted")]
    pub deleted: Vec<DeletedKeyInfo>,
    /// Encoding applied to keys by the service
    pub encoding_type: Option<String>,
}

impl DeleteObjectsResult {
    pub(crate) fn decode_keys(mut self) -> Result<Self, Error> {
        if is_url_encoded(&self.encoding_type) {
            for deleted in &mut self.deleted {
                unescape_in_place(&mut deleted.key)?;
            }
        }
        Ok(self)
    }
}

/// A deleted key
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct DeletedKeyInfo {
    /// Object key
    pub key: String,
    /// Deleted version
    pub version_id: Option<String>,
    /// Whether a delete marker was created or removed
    pub delete_marker: bool,
    /// Version of the delete marker
    pub delete_marker_version_id: Option<String>,
}

/// A common prefix in a listing with a delimiter
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct CommonPrefix {
    /// The prefix
    pub prefix: String,
}

/// Response to `ListObjects`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename = "ListBucketResult", rename_all = "PascalCase")]
pub struct ListObjectsResult {
    /// Bucket name
    pub name: String,
    /// Prefix the listing was restricted to
    pub prefix: String,
    /// Start marker of this page
    pub marker: String,
    /// Page size
    pub max_keys: u32,
    /// Delimiter used to group keys
    pub delimiter: String,
    /// Whether there are more results
    pub is_truncated: bool,
    /// Marker for the next page
    pub next_marker: String,
    /// Objects in this page
    #[serde(rename = "Contents")]
    pub objects: Vec<ObjectProperties>,
    /// Common prefixes in this page
    pub common_prefixes: Vec<CommonPrefix>,
    /// Encoding applied to keys by the service
    pub encoding_type: Option<String>,
}

impl ListObjectsResult {
    pub(crate) fn decode_keys(mut self) -> Result<Self, Error> {
        if is_url_encoded(&self.encoding_type) {
            unescape_in_place(&mut self.prefix)?;
            unescape_in_place(&mut self.marker)?;
            unescape_in_place(&mut self.delimiter)?;
            unescape_in_place(&mut self.next_marker)?;
            for object in &mut self.objects {
                unescape_in_place(&mut object.key)?;
            }
            for prefix in &mut self.common_prefixes {
                unescape_in_place(&mut prefix.prefix)?;
            }
        }
        Ok(self)
    }
}

/// An object in a listing
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct ObjectProperties {
    /// Object key
    pub key: String,
    /// Object type (`Normal`, `Multipart`, `Appendable`, ...)
    #[serde(rename = "Type")]
    pub object_type: String,
    /// Size in bytes
    pub size: u64,
    /// ETag
    #[serde(rename = "ETag")]
    pub etag: String,
    /// Last modification time
    pub last_modified: String,
    /// Storage class
    pub storage_class: String,
}

/// Response to `ListParts`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename = "ListPartsResult", rename_all = "PascalCase")]
pub struct ListUploadedPartsResult {
    /// Bucket name
    pub bucket: String,
    /// Object key
    pub key: String,
    /// Upload id
    pub upload_id: String,
    /// Marker for the next page
    pub next_part_number_marker: String,
    /// Page size
    pub max_parts: u32,
    /// Whether there are more results
    pub is_truncated: bool,
    /// Parts uploaded so far
    #[serde(rename = "Part")]
    pub parts: Vec<UploadedPart>,
}

/// A part that has been uploaded
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct UploadedPart {
    /// 1-based part number
    pub part_number: u64,
    /// Upload time
    pub last_modified: String,
    /// ETag
    #[serde(rename = "ETag")]
    pub etag: String,
    /// Size in bytes
    pub size: u64,
}

/// Response to `ListMultipartUploads`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename = "ListMultipartUploadsResult", rename_all = "PascalCase")]
pub struct ListMultipartUploadsResult {
    /// Bucket name
    pub bucket: String,
    /// Key marker of this page
    pub key_marker: String,
    /// Upload id marker of this page
    pub upload_id_marker: String,
    /// Key marker for the next page
    pub next_key_marker: String,
    /// Upload id marker for the next page
    pub next_upload_id_marker: String,
    /// Page size
    pub max_uploads: u32,
    /// Whether there are more results
    pub is_truncated: bool,
    /// Prefix the listing was restricted to
    pub prefix: String,
    /// Delimiter used to group keys
    pub delimiter: String,
    /// Uploads that were initiated and neither completed nor aborted
    #[serde(rename = "Upload")]
    pub uploads: Vec<UncompletedUpload>,
    /// Common prefixes in this page
    pub common_prefixes: Vec<CommonPrefix>,
    /// Encoding applied to keys by the service
    pub encoding_type: Option<String>,
}

impl ListMultipartUploadsResult {
    pub(crate) fn decode_keys(mut self) -> Result<Self, Error> {
        if is_url_encoded(&self.encoding_type) {
            unescape_in_place(&mut self.key_marker)?;
            unescape_in_place(&mut self.next_key_marker)?;
            unescape_in_place(&mut self.prefix)?;
            unescape_in_place(&mut self.delimiter)?;
            for upload in &mut self.uploads {
                unescape_in_place(&mut upload.key)?;
            }
            for prefix in &mut self.common_prefixes {
                unescape_in_place(&mut prefix.prefix)?;
            }
        }
        Ok(self)
    }
}

/// A multipart upload in progress
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct UncompletedUpload {
    /// Object key
    pub key: String,
    /// Upload id
    pub upload_id: String,
    /// Initiation time
    pub initiated: String,
}

#[cfg(test)]
mod test {
    use super::{
        from_bytes, to_string, CompleteMultipartUpload, Delete, DeleteObject, DeleteObjectsResult,
        ListObjectsResult, UploadPart,
    };
    use crate::error::ServiceError;

    #[test]
    fn test_delete_request_body() {
        let objects = [DeleteObject::new("a+b"), DeleteObject::with_version("c d", "v1")];
        let body = to_string(&Delete {
            quiet: false,
            objects: &objects,
        })
        .unwrap();
        assert_eq!(
            "<Delete><Quiet>false</Quiet><Object><Key>a+b</Key></Object><Object><Key>c d</Key><VersionId>v1</VersionId></Object></Delete>",
            body
        );
    }

    #[test]
    fn test_delete_result_url_decoded() {
        let body = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<DeleteResult>
  <EncodingType>url</EncodingType>
  <Deleted><Key>a%2Bb</Key></Deleted>
  <Deleted><Key>c%20d</Key><DeleteMarker>true</DeleteMarker></Deleted>
</DeleteResult>";
        let result: DeleteObjectsResult = from_bytes(body).unwrap();
        let result = result.decode_keys().unwrap();
        let keys: Vec<_> = result.deleted.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(vec!["a+b", "c d"], keys);
        assert!(result.deleted[1].delete_marker);
    }

    #[test]
    fn test_complete_body() {
        let parts = [
            UploadPart {
                part_number: 1,
                etag: "e1".to_owned(),
            },
            UploadPart {
                part_number: 2,
                etag: "e2".to_owned(),
            },
        ];
        let body = to_string(&CompleteMultipartUpload { parts: &parts }).unwrap();
        assert_eq!(
            "<CompleteMultipartUpload><Part><PartNumber>1</PartNumber><ETag>e1</ETag></Part><Part><PartNumber>2</PartNumber><ETag>e2</ETag></Part></CompleteMultipartUpload>",
            body
        );
    }

    #[test]
    fn test_list_objects() {
        let body = b"<ListBucketResult>
  <Name>buk</Name>
  <Prefix>dir%2F</Prefix>
  <MaxKeys>100</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <EncodingType>url</EncodingType>
  <Contents><Key>dir%2Fa%2Bb</Key><Size>3</Size><ETag>\"x\"</ETag></Contents>
  <CommonPrefixes><Prefix>dir%2Fsub%2F</Prefix></CommonPrefixes>
</ListBucketResult>";
        let result: ListObjectsResult = from_bytes(body).unwrap();
        let result = result.decode_keys().unwrap();
        assert_eq!("dir/", result.prefix);
        assert_eq!("dir/a+b", result.objects[0].key);
        assert_eq!(3, result.objects[0].size);
        assert_eq!("dir/sub/", result.common_prefixes[0].prefix);
    }

    #[test]
    fn test_service_error_document() {
        let body = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<Error>
  <Code>NoSuchKey</Code>
  <Message>The specified key does not exist.</Message>
  <RequestId>5C3D9175B6FC201293AD****</RequestId>
  <HostId>test.oss-cn-hangzhou.aliyuncs.com</HostId>
  <EC>0026-00000001</EC>
</Error>";
        let err: ServiceError = from_bytes(body).unwrap();
        assert_eq!("NoSuchKey", err.code);
        assert_eq!("0026-00000001", err.ec);
    }
}
