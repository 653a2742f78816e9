/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::path::{Path, PathBuf};

use crate::error::{self, Error};
use crate::io::stream::{InputStream, RawInputStream};

/// A region of a file on disk
#[derive(Debug, Clone)]
pub(crate) struct PathBody {
    pub(crate) path: PathBuf,
    pub(crate) length: u64,
    pub(crate) offset: u64,
}

/// Builder for creating an [`InputStream`] backed by a file, see [`InputStream::read_from`]
#[derive(Debug, Default)]
pub struct PathBodyBuilder {
    path: Option<PathBuf>,
    length: Option<u64>,
    offset: Option<u64>,
}

impl PathBodyBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The file to read from
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Number of bytes to read. Defaults to everything from `offset` to the end of the file.
    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    /// Byte offset to start reading at. Defaults to 0.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Build the stream, probing the file length when none was given
    pub fn build(self) -> Result<InputStream, Error> {
        let path = self
            .path
            .ok_or_else(|| error::invalid_input("path is required"))?;
        let offset = self.offset.unwrap_or_default();

        let length = match self.length {
            Some(length) => length,
            None => {
                let file_len = std::fs::metadata(&path)?.len();
                if offset > file_len {
                    return Err(error::invalid_input(format!(
                        "offset {offset} is past the end of {} ({file_len} bytes)",
                        path.display()
                    )));
                }
                file_len - offset
            }
        };

        Ok(InputStream {
            inner: RawInputStream::Fs(PathBody {
                path,
                length,
                offset,
            }),
        })
    }
}
