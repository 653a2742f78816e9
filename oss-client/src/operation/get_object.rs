/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{ACCEPT_ENCODING, CONTENT_TYPE, ETAG, RANGE};
use http::{HeaderMap, Method};
use tokio::io::AsyncWriteExt;

use crate::client::Handle;
use crate::conn::{self, Request, Response};
use crate::error::Error;
use crate::http::{header, ResponseBody};
use crate::io::crc64::SharedCrc64;
use crate::io::tee::{Observers, TeeStream};
use crate::io::ByteRange;
use crate::operation::{required, RequestOptions};
use crate::progress::{self, ProgressEvent, ProgressEventKind};

/// Response of a `GetObject`.
///
/// The body has not been read yet. It reports download progress and feeds the client side
/// CRC64 as it is consumed.
#[derive(Debug)]
#[non_exhaustive]
pub struct GetObjectOutput {
    /// Object content
    pub body: ResponseBody,
    /// Length of the body, when the service sent one
    pub content_length: Option<u64>,
    /// `Content-Type` of the object
    pub content_type: Option<String>,
    /// ETag of the object
    pub etag: String,
    /// CRC64 of the whole object as reported by the service
    pub crc64: Option<u64>,
    /// Request id assigned by the service
    pub request_id: String,
    /// All response headers
    pub headers: HeaderMap,
    crc: Option<SharedCrc64>,
    verify: bool,
}

impl GetObjectOutput {
    /// CRC64 of the body bytes consumed so far, when CRC64 checks are enabled
    pub fn client_crc64(&self) -> Option<u64> {
        self.crc.as_ref().map(SharedCrc64::get)
    }

    /// Read the whole body into memory, checking its CRC64 for full, uncompressed downloads
    pub async fn collect(self) -> Result<Bytes, Error> {
        let crc = self.crc.clone();
        let data = self.body.collect().await?;
        if self.verify {
            conn::check_crc(
                crc.map(|c| c.get()),
                self.crc64,
                "GetObject",
                &self.request_id,
            )?;
        }
        Ok(data)
    }
}

/// Response of a `GetObject` written to a local file
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct GetObjectToFileOutput {
    /// Number of bytes written
    pub size: u64,
    /// ETag of the object
    pub etag: String,
    /// CRC64 of the object as reported by the service
    pub crc64: Option<u64>,
    /// Request id assigned by the service
    pub request_id: String,
    /// All response headers
    pub headers: HeaderMap,
}

/// Fluent builder for `GetObject`, `GetObjectToFile` and `GetObjectWithURL`
#[derive(Debug)]
pub struct GetObjectFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    key: Option<String>,
    version_id: Option<String>,
    range: Option<ByteRange>,
    signed_url: Option<String>,
    options: RequestOptions,
}

impl GetObjectFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            key: None,
            version_id: None,
            range: None,
            signed_url: None,
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

    /// Fetch a specific version of the object
    pub fn version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Download only part of the object
    pub fn range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }

    pub(crate) fn signed_url(mut self, url: impl Into<String>) -> Self {
        self.signed_url = Some(url.into());
        self
    }

    /// Add a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.header(name, value);
        self
    }

    /// Parameters, headers and behavioral options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Send the request and return the response with its body unread
    #[tracing::instrument(skip_all, level = "debug", name = "get-object")]
    pub async fn send(mut self) -> Result<GetObjectOutput, Error> {
        if let Some(range) = self.range.take() {
            self.options = self.options.header(RANGE.as_str(), range.to_string());
        }
        // a ranged or compressed body does not match the object's CRC64
        let verify = self.options.get_header(RANGE.as_str()).is_none()
            && !self
                .options
                .get_header(ACCEPT_ENCODING.as_str())
                .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));
        let listener = self.options.listener.take();

        let resp = match self.signed_url.take() {
            Some(url) => {
                let req = self.options.apply(Request::new(Method::GET, "", ""))?;
                self.handle.conn.execute_url(&url, req).await?
            }
            None => {
                let bucket = required(self.bucket, "bucket")?;
                let key = required(self.key, "key")?;
                conn::validate_object_name(&key)?;
                let req = Request::new(Method::GET, bucket, key)
                    .opt_param("versionId", self.version_id);
                let req = self.options.apply(req)?;
                self.handle.conn.execute(req).await?
            }
        };

        let Response {
            headers,
            body,
            server_crc,
            ..
        } = resp;
        let content_length = header::get_u64(&headers, http::header::CONTENT_LENGTH.as_str());
        let crc = self
            .handle
            .config()
            .crc_enabled()
            .then(|| SharedCrc64::new(0));

        progress::publish(
            listener.as_ref(),
            ProgressEvent::new(ProgressEventKind::Started, 0, content_length, 0),
        );
        let observers = Observers {
            crc: crc.clone(),
            listener,
            total: content_length,
            ..Default::default()
        };
        let body = ResponseBody::from_stream(TeeStream::new(body.into_inner(), observers));

        Ok(GetObjectOutput {
            body,
            content_length,
            content_type: header::get(&headers, CONTENT_TYPE.as_str()).map(str::to_owned),
            etag: header::get(&headers, ETAG.as_str())
                .unwrap_or_default()
                .to_owned(),
            crc64: server_crc,
            request_id: header::get(&headers, header::REQUEST_ID)
                .unwrap_or_default()
                .to_owned(),
            headers,
            verify: verify && crc.is_some(),
            crc,
        })
    }

    /// Download the object into `path`.
    ///
    /// The content is written to `<path>.temp` first and renamed once complete and verified.
    /// The temporary file is removed on failure.
    #[tracing::instrument(skip_all, level = "debug", name = "get-object-to-file")]
    pub async fn send_to_file(
        self,
        path: impl AsRef<Path>,
    ) -> Result<GetObjectToFileOutput, Error> {
        let path = path.as_ref();
        let temp_path = temp_file_path(path);
        let output = self.send().await?;

        match write_body(output, &temp_path).await {
            Ok(output) => {
                tokio::fs::rename(&temp_path, path).await?;
                Ok(output)
            }
            Err(err) => {
                if let Err(remove_err) = tokio::fs::remove_file(&temp_path).await {
                    tracing::debug!(
                        path = %temp_path.display(),
                        error = %remove_err,
                        "failed to remove temporary download file"
                    );
                }
                Err(err)
            }
        }
    }
}

fn temp_file_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".temp");
    PathBuf::from(name)
}

async fn write_body(output: GetObjectOutput, temp_path: &Path) -> Result<GetObjectToFileOutput, Error> {
    let GetObjectOutput {
        mut body,
        etag,
        crc64,
        request_id,
        headers,
        crc,
        verify,
        ..
    } = output;

    let mut file = tokio::fs::File::create(temp_path).await?;
    let mut size = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    if verify {
        conn::check_crc(crc.map(|c| c.get()), crc64, "GetObjectToFile", &request_id)?;
    }
    Ok(GetObjectToFileOutput {
        size,
        etag,
        crc64,
        request_id,
        headers,
    })
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::temp_file_path;

    #[test]
    fn test_temp_file_path() {
        assert_eq!(
            Path::new("/tmp/out.bin.temp"),
            temp_file_path(Path::new("/tmp/out.bin"))
        );
    }
}
