/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::io::SeekFrom;
use std::path::Path;

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::error::Error;
use crate::http::body::BoxReader;
use crate::io::path_body::{PathBody, PathBodyBuilder};
use crate::io::size_hint::SizeHint;

/// Source of binary data for a request body.
///
/// The remaining length is known for in-memory buffers, files and seekable readers. Plain
/// readers may declare their length, otherwise it is unknown and the body is sent chunked.
#[derive(Debug)]
pub struct InputStream {
    pub(super) inner: RawInputStream,
}

impl InputStream {
    /// Create a new `InputStream` from a static byte slice
    pub fn from_static(bytes: &'static [u8]) -> Self {
        let inner = RawInputStream::Buf(bytes.into());
        Self { inner }
    }

    /// Return the bounds on the remaining length of the `InputStream`
    pub fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }

    /// Returns a [`PathBodyBuilder`], allowing you to build a `InputStream` with
    /// full control over how the file is read (eg. specifying the length of
    /// the file or the starting offset to read from).
    ///
    /// ```no_run
    /// # {
    /// use oss_client::io::InputStream;
    ///
    /// fn input_stream_from_file() -> InputStream {
    ///     InputStream::read_from()
    ///         .path("docs/some-large-file.csv")
    ///         .offset(1024)
    ///         .build()
    ///         .expect("valid path")
    /// }
    /// # }
    /// ```
    pub fn read_from() -> PathBodyBuilder {
        PathBodyBuilder::new()
    }

    /// Create a new `InputStream` that reads data from a given `path`.
    ///
    /// The length of the file is read once, the contents MUST NOT change while the request is
    /// in flight.
    pub fn from_path(path: impl AsRef<Path>) -> Result<InputStream, Error> {
        Self::read_from().path(path).build()
    }

    /// Create a new `InputStream` from an arbitrary reader.
    ///
    /// Pass `content_length` when the number of bytes the reader yields is known.
    pub fn from_reader<R>(reader: R, content_length: Option<u64>) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let hint = content_length
            .map(SizeHint::exact)
            .unwrap_or_else(SizeHint::unknown);
        Self {
            inner: RawInputStream::Dyn(DynReader {
                reader: Box::pin(reader),
                hint,
            }),
        }
    }

    /// Create a new `InputStream` from a seekable reader. The remaining length is the distance
    /// between the current position and the end of the stream.
    pub async fn from_seekable<R>(mut reader: R) -> Result<Self, Error>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + Sync + 'static,
    {
        let current = reader.stream_position().await?;
        let end = reader.seek(SeekFrom::End(0)).await?;
        reader.seek(SeekFrom::Start(current)).await?;
        Ok(Self::from_reader(reader, Some(end.saturating_sub(current))))
    }

    /// Open the stream for reading, returning the reader and its length when known
    pub(crate) async fn into_reader(self) -> Result<(BoxReader, Option<u64>), Error> {
        match self.inner {
            RawInputStream::Buf(bytes) => {
                let len = bytes.remaining() as u64;
                Ok((Box::pin(std::io::Cursor::new(bytes)), Some(len)))
            }
            RawInputStream::Fs(body) => {
                let mut file = tokio::fs::File::open(&body.path).await?;
                if body.offset > 0 {
                    file.seek(SeekFrom::Start(body.offset)).await?;
                }
                Ok((Box::pin(file.take(body.length)), Some(body.length)))
            }
            RawInputStream::Dyn(dyn_reader) => Ok((dyn_reader.reader, dyn_reader.hint.exact_len())),
        }
    }
}

#[derive(Debug)]
pub(super) enum RawInputStream {
    /// In-memory buffer to read from
    Buf(Bytes),
    /// File based input
    Fs(PathBody),
    /// User provided reader
    Dyn(DynReader),
}

pub(super) struct DynReader {
    reader: BoxReader,
    hint: SizeHint,
}

impl fmt::Debug for DynReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynReader(dyn AsyncRead)")
            .field("hint", &self.hint)
            .finish()
    }
}

impl RawInputStream {
    pub(super) fn size_hint(&self) -> SizeHint {
        match self {
            RawInputStream::Buf(bytes) => SizeHint::exact(bytes.remaining() as u64),
            RawInputStream::Fs(path_body) => SizeHint::exact(path_body.length),
            RawInputStream::Dyn(dyn_reader) => dyn_reader.hint,
        }
    }
}

impl Default for InputStream {
    fn default() -> Self {
        Self {
            inner: RawInputStream::Buf(Bytes::default()),
        }
    }
}

impl From<Bytes> for InputStream {
    fn from(value: Bytes) -> Self {
        Self {
            inner: RawInputStream::Buf(value),
        }
    }
}

impl From<Vec<u8>> for InputStream {
    fn from(value: Vec<u8>) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<String> for InputStream {
    fn from(value: String) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<&'static [u8]> for InputStream {
    fn from(slice: &'static [u8]) -> InputStream {
        Self::from(Bytes::from_static(slice))
    }
}

impl From<&'static str> for InputStream {
    fn from(slice: &'static str) -> InputStream {
        Self::from(Bytes::from_static(slice.as_bytes()))
    }
}

#[cfg(test)]
mod test {
    use std::io::{Seek, SeekFrom, Write};

    use tempfile::NamedTempFile;
    use tokio::io::AsyncReadExt;

    use super::InputStream;

    async fn read_all(stream: InputStream) -> (Vec<u8>, Option<u64>) {
        let (mut reader, len) = stream.into_reader().await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        (out, len)
    }

    #[tokio::test]
    async fn test_bytes() {
        let (data, len) = read_all(InputStream::from("hello")).await;
        assert_eq!(b"hello".to_vec(), data);
        assert_eq!(Some(5), len);
    }

    #[tokio::test]
    async fn test_path_with_offset() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();
        let stream = InputStream::read_from()
            .path(tmp.path())
            .offset(3)
            .length(4)
            .build()
            .unwrap();
        assert_eq!(Some(4), stream.size_hint().exact_len());
        let (data, _) = read_all(stream).await;
        assert_eq!(b"3456".to_vec(), data);
    }

    #[tokio::test]
    async fn test_unknown_length_reader() {
        let stream = InputStream::from_reader(std::io::Cursor::new(b"abc".to_vec()), None);
        assert_eq!(None, stream.size_hint().exact_len());
        let (data, len) = read_all(stream).await;
        assert_eq!(b"abc".to_vec(), data);
        assert_eq!(None, len);
    }

    #[tokio::test]
    async fn test_seekable_remaining_length() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();
        let mut file = tmp.reopen().unwrap();
        file.seek(SeekFrom::Start(6)).unwrap();
        let stream = InputStream::from_seekable(tokio::fs::File::from_std(file))
            .await
            .unwrap();
        assert_eq!(Some(4), stream.size_hint().exact_len());
        let (data, _) = read_all(stream).await;
        assert_eq!(b"6789".to_vec(), data);
    }
}
