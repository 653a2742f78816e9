/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use crate::config::Config;
use crate::conn::Conn;
use crate::error::Error;
use crate::operation::append_object::AppendObjectFluentBuilder;
use crate::operation::copy_object::CopyObjectFluentBuilder;
use crate::operation::delete_object::DeleteObjectFluentBuilder;
use crate::operation::delete_objects::DeleteObjectsFluentBuilder;
use crate::operation::get_object::GetObjectFluentBuilder;
use crate::operation::list_objects::ListObjectsFluentBuilder;
use crate::operation::multipart::{
    AbortMultipartUploadFluentBuilder, CompleteMultipartUploadFluentBuilder,
    InitiateMultipartUploadFluentBuilder, ListMultipartUploadsFluentBuilder,
    ListUploadedPartsFluentBuilder, UploadPartFluentBuilder,
};
use crate::operation::object_meta::{GetObjectMetaFluentBuilder, IsObjectExistFluentBuilder};
use crate::operation::presign::{SignRtmpUrlFluentBuilder, SignUrlFluentBuilder};
use crate::operation::put_object::PutObjectFluentBuilder;
use crate::operation::upload::UploadFluentBuilder;
use crate::types::{ConcurrencySetting, PartSize};
use crate::{DEFAULT_CONCURRENCY, DEFAULT_PART_SIZE, MAX_CONCURRENCY};

/// Object storage client
///
/// The client is cheap to clone: clones share the connection pool and configuration. It is
/// safe to use concurrently from many tasks.
///
/// ```no_run
/// # async fn example() -> Result<(), oss_client::error::Error> {
/// use oss_client::config::Config;
/// use oss_client::credentials::Credentials;
/// use oss_client::Client;
///
/// let config = Config::builder()
///     .endpoint("https://oss-cn-hangzhou.aliyuncs.com")
///     .credentials(Credentials::new("ak", "sk", None))
///     .build()?;
/// let client = Client::new(config)?;
///
/// client
///     .put_object()
///     .bucket("examplebucket")
///     .key("hello.txt")
///     .body("hello world".into())
///     .send()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    handle: Arc<Handle>,
}

/// Whatever is needed to carry out operations, e.g. the request engine
#[derive(Debug)]
pub(crate) struct Handle {
    pub(crate) conn: Conn,
}

impl Handle {
    pub(crate) fn config(&self) -> &Config {
        self.conn.config()
    }

    /// Default number of part workers for multipart uploads
    pub(crate) fn num_workers(&self) -> usize {
        match self.config().concurrency() {
            ConcurrencySetting::Auto => DEFAULT_CONCURRENCY,
            ConcurrencySetting::Explicit(explicit) => (*explicit).clamp(1, MAX_CONCURRENCY),
        }
    }

    /// Default part size for multipart uploads
    pub(crate) fn part_size(&self) -> u64 {
        match self.config().part_size() {
            PartSize::Auto => DEFAULT_PART_SIZE,
            PartSize::Target(explicit) => *explicit,
        }
    }
}

impl Client {
    /// Creates a new client from a config.
    pub fn new(config: Config) -> Result<Client, Error> {
        let conn = Conn::new(config)?;
        let handle = Arc::new(Handle { conn });
        Ok(Client { handle })
    }

    /// Returns the client's configuration
    pub fn config(&self) -> &Config {
        self.handle.config()
    }

    /// Upload an object in a single request.
    ///
    /// Constructs a fluent builder for the
    /// [`PutObject`](crate::operation::put_object::PutObjectFluentBuilder) operation.
    pub fn put_object(&self) -> PutObjectFluentBuilder {
        PutObjectFluentBuilder::new(self.handle.clone())
    }

    /// Upload an object to a pre-signed URL
    pub fn put_object_with_url(&self, signed_url: impl Into<String>) -> PutObjectFluentBuilder {
        PutObjectFluentBuilder::new(self.handle.clone()).signed_url(signed_url)
    }

    /// Download an object, as a stream or into a local file.
    pub fn get_object(&self) -> GetObjectFluentBuilder {
        GetObjectFluentBuilder::new(self.handle.clone())
    }

    /// Download an object from a pre-signed URL
    pub fn get_object_with_url(&self, signed_url: impl Into<String>) -> GetObjectFluentBuilder {
        GetObjectFluentBuilder::new(self.handle.clone()).signed_url(signed_url)
    }

    /// Append to an appendable object
    pub fn append_object(&self) -> AppendObjectFluentBuilder {
        AppendObjectFluentBuilder::new(self.handle.clone())
    }

    /// Copy an object inside a bucket or between buckets
    pub fn copy_object(&self) -> CopyObjectFluentBuilder {
        CopyObjectFluentBuilder::new(self.handle.clone())
    }

    /// Delete an object
    pub fn delete_object(&self) -> DeleteObjectFluentBuilder {
        DeleteObjectFluentBuilder::new(self.handle.clone())
    }

    /// Delete up to 1000 objects with one request
    pub fn delete_objects(&self) -> DeleteObjectsFluentBuilder {
        DeleteObjectsFluentBuilder::new(self.handle.clone())
    }

    /// Fetch the basic metadata of an object
    pub fn get_object_meta(&self) -> GetObjectMetaFluentBuilder {
        GetObjectMetaFluentBuilder::new(self.handle.clone())
    }

    /// Check whether an object exists
    pub fn is_object_exist(&self) -> IsObjectExistFluentBuilder {
        IsObjectExistFluentBuilder::new(self.handle.clone())
    }

    /// List one page of the objects in a bucket
    pub fn list_objects(&self) -> ListObjectsFluentBuilder {
        ListObjectsFluentBuilder::new(self.handle.clone())
    }

    /// Start a multipart upload
    pub fn initiate_multipart_upload(&self) -> InitiateMultipartUploadFluentBuilder {
        InitiateMultipartUploadFluentBuilder::new(self.handle.clone())
    }

    /// Upload one part of a multipart upload
    pub fn upload_part(&self) -> UploadPartFluentBuilder {
        UploadPartFluentBuilder::new(self.handle.clone())
    }

    /// Assemble the uploaded parts into an object
    pub fn complete_multipart_upload(&self) -> CompleteMultipartUploadFluentBuilder {
        CompleteMultipartUploadFluentBuilder::new(self.handle.clone())
    }

    /// Abort a multipart upload and discard its parts
    pub fn abort_multipart_upload(&self) -> AbortMultipartUploadFluentBuilder {
        AbortMultipartUploadFluentBuilder::new(self.handle.clone())
    }

    /// List the parts uploaded so far
    pub fn list_uploaded_parts(&self) -> ListUploadedPartsFluentBuilder {
        ListUploadedPartsFluentBuilder::new(self.handle.clone())
    }

    /// List multipart uploads in progress
    pub fn list_multipart_uploads(&self) -> ListMultipartUploadsFluentBuilder {
        ListMultipartUploadsFluentBuilder::new(self.handle.clone())
    }

    /// Create a pre-signed URL
    pub fn sign_url(&self) -> SignUrlFluentBuilder {
        SignUrlFluentBuilder::new(self.handle.clone())
    }

    /// Create a signed live channel push URL
    pub fn sign_rtmp_url(&self) -> SignRtmpUrlFluentBuilder {
        SignRtmpUrlFluentBuilder::new(self.handle.clone())
    }

    /// Upload a local file with a concurrent, optionally resumable, multipart upload.
    ///
    /// ```no_run
    /// # async fn example(client: &oss_client::Client) -> Result<(), oss_client::error::Error> {
    /// use oss_client::operation::upload::CheckpointConfig;
    ///
    /// let handle = client
    ///     .upload_file()
    ///     .bucket("examplebucket")
    ///     .key("big.bin")
    ///     .file_path("/tmp/big.bin")
    ///     .checkpoint(CheckpointConfig::enabled())
    ///     .send()
    ///     .await?;
    /// let output = handle.join().await?;
    /// println!("uploaded {}", output.etag);
    /// # Ok(())
    /// # }
    /// ```
    pub fn upload_file(&self) -> UploadFluentBuilder {
        UploadFluentBuilder::new(self.handle.clone())
    }
}

#[cfg(test)]
mod test {
    use crate::config::Config;
    use crate::credentials::Credentials;
    use crate::types::{ConcurrencySetting, PartSize};

    #[test]
    fn test_handle_defaults() {
        let config = Config::builder()
            .endpoint("127.0.0.1:9000")
            .credentials(Credentials::new("ak", "sk", None))
            .concurrency(ConcurrencySetting::Explicit(1000))
            .part_size(PartSize::Target(1024 * 1024))
            .build()
            .unwrap();
        let client = super::Client::new(config).unwrap();
        assert_eq!(100, client.handle.num_workers());
        assert_eq!(1024 * 1024, client.handle.part_size());
    }
}
