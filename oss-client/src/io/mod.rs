/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/// CRC64 helpers
pub mod crc64;
pub(crate) mod limit;
pub(crate) mod md5;
pub(crate) mod part_reader;
mod path_body;
mod range;
mod size_hint;
mod stream;
pub(crate) mod tee;

// re-exports
pub use self::part_reader::{plan_parts, FileChunk, MAX_PARTS, MAX_PART_SIZE, MIN_PART_SIZE};
pub use self::path_body::PathBodyBuilder;
pub use self::range::ByteRange;
pub use self::size_hint::SizeHint;
pub use self::stream::InputStream;
