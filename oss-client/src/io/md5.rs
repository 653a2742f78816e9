/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pin_project_lite::pin_project;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, ReadBuf};

use crate::error::Error;
use crate::http::body::BoxReader;

pub(crate) const TEMP_FILE_PREFIX: &str = "oss-temp-";

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Base64 encoded MD5 digest, the format of the `Content-MD5` header
pub(crate) fn base64_md5(data: &[u8]) -> String {
    BASE64.encode(md5::compute(data).0)
}

/// Hex encoded MD5 digest
pub(crate) fn hex_md5(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// A body whose MD5 has been computed ahead of sending it
pub(crate) struct Md5Body {
    pub(crate) reader: BoxReader,
    pub(crate) content_length: Option<u64>,
    pub(crate) content_md5: String,
}

/// Read `reader` to the end computing its MD5 and return a reader replaying the same bytes.
///
/// Bodies of unknown or zero length and bodies larger than `threshold` are spilled to a
/// temporary file which is removed once the returned reader is dropped. Smaller bodies are
/// buffered in memory.
pub(crate) async fn precompute(
    mut reader: BoxReader,
    content_length: Option<u64>,
    threshold: u64,
) -> Result<Md5Body, Error> {
    let spill = match content_length {
        None | Some(0) => true,
        Some(len) => len > threshold,
    };

    if !spill {
        let mut buf = Vec::with_capacity(content_length.unwrap_or_default() as usize);
        reader.read_to_end(&mut buf).await?;
        let content_md5 = base64_md5(&buf);
        let len = buf.len() as u64;
        return Ok(Md5Body {
            reader: Box::pin(io::Cursor::new(buf)),
            content_length: Some(len),
            content_md5,
        });
    }

    let (file, path) = spill_file()?;
    let mut file = tokio::fs::File::from_std(file);

    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut written = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
        file.write_all(&buf[..n]).await?;
        written += n as u64;
    }
    file.flush().await?;
    file.seek(SeekFrom::Start(0)).await?;
    tracing::trace!(path = ?path, bytes = written, "spilled request body to compute md5");

    Ok(Md5Body {
        reader: Box::pin(SpillReader { file, _path: path }),
        content_length: Some(written),
        content_md5: BASE64.encode(ctx.compute().0),
    })
}

// Named temp file in the system temp dir, removed when the path is dropped
fn spill_file() -> io::Result<(std::fs::File, TempPath)> {
    Ok(tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile()?
        .into_parts())
}

pin_project! {
    // Temp file backed body, the file is unlinked when the reader is dropped
    struct SpillReader {
        #[pin]
        file: tokio::fs::File,
        _path: TempPath,
    }
}

impl AsyncRead for SpillReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().file.poll_read(cx, buf)
    }
}

#[cfg(test)]
mod test {
    use tokio::io::AsyncReadExt;

    use super::{base64_md5, hex_md5, precompute};

    async fn drain(body: super::Md5Body) -> Vec<u8> {
        let mut reader = body.reader;
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    }

    #[test]
    fn test_digests() {
        assert_eq!("XUFAKrxLKna5cZ2REBfFkg==", base64_md5(b"hello"));
        assert_eq!("5d41402abc4b2a76b9719d911017c592", hex_md5(b"hello"));
    }

    #[tokio::test]
    async fn test_in_memory() {
        let reader = Box::pin(std::io::Cursor::new(b"hello".to_vec()));
        let body = precompute(reader, Some(5), 1024).await.unwrap();
        assert_eq!("XUFAKrxLKna5cZ2REBfFkg==", body.content_md5);
        assert_eq!(Some(5), body.content_length);
        assert_eq!(b"hello".to_vec(), drain(body).await);
    }

    #[tokio::test]
    async fn test_spill_unknown_length() {
        let data = vec![7u8; 200 * 1024];
        let reader = Box::pin(std::io::Cursor::new(data.clone()));
        let body = precompute(reader, None, 1024).await.unwrap();
        assert_eq!(base64_md5(&data), body.content_md5);
        assert_eq!(Some(data.len() as u64), body.content_length);
        assert_eq!(data, drain(body).await);
    }

    #[test]
    fn test_spill_file_naming() {
        let (_file, path) = super::spill_file().unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_owned();
        assert!(name.starts_with("oss-temp-"), "{name}");
        assert_eq!(Some(std::env::temp_dir().as_path()), path.parent());
        let kept = path.to_path_buf();
        assert!(kept.exists());
        drop(path);
        assert!(!kept.exists());
    }
}
