/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{self, Error};
use crate::types::ByteUnit;

/// Smallest part size accepted by the service
pub const MIN_PART_SIZE: u64 = ByteUnit::Kibibyte.times(100);
/// Largest part size accepted by the service
pub const MAX_PART_SIZE: u64 = ByteUnit::Gibibyte.times(5);
/// Maximum number of parts in a single multipart upload
pub const MAX_PARTS: u64 = 10_000;

/// A byte range of a source file uploaded as one part
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChunk {
    /// 1-based part number
    #[serde(rename = "Number")]
    pub number: u64,
    /// Offset of the first byte in the file
    #[serde(rename = "Offset")]
    pub offset: u64,
    /// Number of bytes
    #[serde(rename = "Size")]
    pub size: u64,
}

/// Split a file of `file_size` bytes into parts of `part_size` bytes.
///
/// All parts but the last have exactly `part_size` bytes. An empty file yields a single empty
/// part so that the upload still produces an object.
pub fn plan_parts(file_size: u64, part_size: u64) -> Result<Vec<FileChunk>, Error> {
    if !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&part_size) {
        return Err(error::invalid_input(format!(
            "part size {part_size} must be between {MIN_PART_SIZE} and {MAX_PART_SIZE} bytes"
        )));
    }

    let count = file_size.div_ceil(part_size).max(1);
    if count > MAX_PARTS {
        return Err(error::invalid_input(format!(
            "{file_size} bytes at a part size of {part_size} needs {count} parts, at most {MAX_PARTS} are allowed"
        )));
    }

    let chunks = (0..count)
        .map(|i| {
            let offset = i * part_size;
            FileChunk {
                number: i + 1,
                offset,
                size: part_size.min(file_size - offset),
            }
        })
        .collect();
    Ok(chunks)
}

/// Contents of a single part
#[derive(Debug, Clone)]
pub(crate) struct PartData {
    // 1-indexed
    pub(crate) part_number: u64,
    pub(crate) data: Bytes,
}

/// Read the bytes of `chunk` from the file at `path` on the blocking pool
pub(crate) async fn read_chunk(path: PathBuf, chunk: FileChunk) -> Result<PartData, Error> {
    let handle = tokio::task::spawn_blocking(move || {
        let mut dst = vec![0u8; chunk.size as usize];
        file_util::read_file_chunk_sync(&mut dst, path, chunk.offset)?;
        Ok::<PartData, Error>(PartData {
            part_number: chunk.number,
            data: Bytes::from(dst),
        })
    });

    handle.await?
}

mod file_util {
    #[cfg(unix)]
    pub(super) use unix::read_file_chunk_sync;
    #[cfg(windows)]
    pub(super) use windows::read_file_chunk_sync;

    #[cfg(unix)]
    mod unix {
        use std::fs::File;
        use std::io;
        use std::os::unix::fs::FileExt;
        use std::path::Path;

        pub(crate) fn read_file_chunk_sync(
            dst: &mut [u8],
            path: impl AsRef<Path>,
            offset: u64,
        ) -> Result<(), io::Error> {
            let file = File::open(path)?;
            file.read_exact_at(dst, offset)
        }
    }

    #[cfg(windows)]
    mod windows {
        use std::fs::File;
        use std::io;
        use std::io::{Read, Seek, SeekFrom};
        use std::path::Path;

        pub(crate) fn read_file_chunk_sync(
            dst: &mut [u8],
            path: impl AsRef<Path>,
            offset: u64,
        ) -> Result<(), io::Error> {
            let mut file = File::open(path)?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(dst)
        }
    }
}
