/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

// Service specific header names. Standard names come from `http::header`.

pub(crate) const OSS_PREFIX: &str = "x-oss-";
pub(crate) const OSS_META_PREFIX: &str = "x-oss-meta-";

pub(crate) const SECURITY_TOKEN: &str = "x-oss-security-token";
pub(crate) const REQUEST_ID: &str = "x-oss-request-id";
pub(crate) const HASH_CRC64: &str = "x-oss-hash-crc64ecma";
pub(crate) const NEXT_APPEND_POSITION: &str = "x-oss-next-append-position";
pub(crate) const VERSION_ID: &str = "x-oss-version-id";
pub(crate) const DELETE_MARKER: &str = "x-oss-delete-marker";
pub(crate) const COPY_SOURCE: &str = "x-oss-copy-source";
pub(crate) const COPY_SOURCE_VERSION_ID: &str = "x-oss-copy-source-version-id";
pub(crate) const STORAGE_CLASS: &str = "x-oss-storage-class";
pub(crate) const CALLBACK: &str = "x-oss-callback";
pub(crate) const CALLBACK_VAR: &str = "x-oss-callback-var";
pub(crate) const ERR: &str = "x-oss-err";
pub(crate) const EC: &str = "x-oss-ec";
pub(crate) const CONTENT_MD5: &str = "content-md5";

/// Value of a header as a string, if present and valid UTF-8/ASCII
pub(crate) fn get<'a>(headers: &'a http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Value of a header parsed as an integer, if present and well formed
pub(crate) fn get_u64(headers: &http::HeaderMap, name: &str) -> Option<u64> {
    get(headers, name).and_then(|v| v.trim().parse().ok())
}
