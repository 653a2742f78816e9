/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */

//! Object storage client
//!
//! An asynchronous client for an S3 style object storage service: request signing (v1 and v2,
//! pre-signed and RTMP URLs), single request object operations with CRC64 and MD5 integrity
//! checks, and a concurrent multipart upload of local files that can resume from a checkpoint.
//!
//! Start with [`Config::builder`] and [`Client::new`].

#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

use crate::types::ByteUnit;

/// Default number of part workers of a multipart upload
pub(crate) const DEFAULT_CONCURRENCY: usize = 8;

/// Upper bound for the number of part workers of a multipart upload
pub(crate) const MAX_CONCURRENCY: usize = 100;

/// Default part size of a multipart upload
pub(crate) const DEFAULT_PART_SIZE: u64 = ByteUnit::Mebibyte.times(8);

/// Error types emitted by `oss-client`
pub mod error;

/// Common types used by `oss-client`
pub mod types;

/// Types and helpers for I/O
pub mod io;

/// Client configuration
pub mod config;

/// Access keys and credential providers
pub mod credentials;

/// Pluggable HTTP transport
pub mod http;

/// Request URL construction
pub mod url;

/// Transfer progress reporting
pub mod progress;

/// Request and response documents
pub mod xml;

pub(crate) mod auth;
pub(crate) mod conn;
pub(crate) mod runtime;

/// Object storage client
pub mod client;

/// Client operations
pub mod operation;

pub use client::Client;
pub use config::Config;
