/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// The target part size for a multipart upload.
#[derive(Debug, Clone, Default)]
pub enum PartSize {
    /// Use the client default (8 MiB).
    #[default]
    Auto,

    /// Part size explicitly given.
    ///
    /// NOTE: This must lie in `[100 KiB, 5 GiB]` and produce no more than 10,000 parts, the
    /// upload is rejected otherwise.
    Target(u64),
}

/// The number of parallel part workers to use for a single multipart upload.
#[derive(Debug, Clone, Default)]
pub enum ConcurrencySetting {
    /// Use the client default.
    #[default]
    Auto,

    /// Explicitly configured number of workers, clipped to `[1, 100]`.
    Explicit(usize),
}

/// Signature scheme used to authenticate requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthVersion {
    /// HMAC-SHA1, `Authorization: OSS <key>:<signature>`
    #[default]
    V1,
    /// HMAC-SHA256 with the additional-headers extension
    V2,
    /// Declared for completeness, not supported by this client.
    V4,
}

/// Storage class of an object
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageClass {
    /// Standard storage
    Standard,
    /// Infrequent access
    IA,
    /// Archive storage
    Archive,
    /// Cold archive storage
    ColdArchive,
}

impl StorageClass {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "Standard",
            StorageClass::IA => "IA",
            StorageClass::Archive => "Archive",
            StorageClass::ColdArchive => "ColdArchive",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Units of data size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteUnit {
    /// 1 byte
    Byte,
    /// 2<sup>10</sup> bytes.
    Kibibyte,
    /// 2<sup>20</sup> bytes.
    Mebibyte,
    /// 2<sup>30</sup> bytes.
    Gibibyte,
}

impl ByteUnit {
    /// The number of bytes represented by this unit
    pub const fn as_bytes_u64(&self) -> u64 {
        match self {
            ByteUnit::Byte => 1,
            ByteUnit::Kibibyte => 1 << 10,
            ByteUnit::Mebibyte => 1 << 20,
            ByteUnit::Gibibyte => 1 << 30,
        }
    }

    /// `n` of this unit, in bytes
    pub const fn times(&self, n: u64) -> u64 {
        n * self.as_bytes_u64()
    }
}
