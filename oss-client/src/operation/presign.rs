/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use http::Method;

use crate::client::Handle;
use crate::error::Error;
use crate::operation::{required, RequestOptions};

const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy)]
enum Expiry {
    In(Duration),
    At(i64),
}

impl Expiry {
    fn unix_seconds(self) -> i64 {
        match self {
            Expiry::In(duration) => Utc::now().timestamp() + duration.as_secs() as i64,
            Expiry::At(at) => at,
        }
    }
}

/// Fluent builder for a pre-signed URL.
///
/// The URL carries the signature in its query string. Headers that take part in the signature
/// (`Content-Type`, `Content-MD5`, `x-oss-*`) must be sent unchanged by whoever uses it.
#[derive(Debug)]
pub struct SignUrlFluentBuilder {
    handle: Arc<Handle>,
    method: Method,
    bucket: Option<String>,
    key: Option<String>,
    expiry: Expiry,
    options: RequestOptions,
}

impl SignUrlFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            method: Method::GET,
            bucket: None,
            key: None,
            expiry: Expiry::In(DEFAULT_EXPIRES_IN),
            options: RequestOptions::default(),
        }
    }

    /// HTTP method the URL is valid for, `GET` by default
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
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

    /// How long the URL stays valid, one hour by default
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expiry = Expiry::In(duration);
        self
    }

    /// Absolute expiry time in seconds since the Unix epoch
    pub fn expires_at(mut self, unix_seconds: i64) -> Self {
        self.expiry = Expiry::At(unix_seconds);
        self
    }

    /// Add a header the URL will be used with
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.header(name, value);
        self
    }

    /// Query parameters and headers to sign
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Create the URL
    #[tracing::instrument(skip_all, level = "debug", name = "sign-url")]
    pub async fn send(self) -> Result<String, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let key = required(self.key, "key")?;
        let headers = self.options.header_map()?;
        self.handle
            .conn
            .sign_url(
                &self.method,
                &bucket,
                &key,
                self.expiry.unix_seconds(),
                self.options.params,
                headers,
            )
            .await
    }
}

/// Fluent builder for a signed live channel push URL (`rtmp://`)
#[derive(Debug)]
pub struct SignRtmpUrlFluentBuilder {
    handle: Arc<Handle>,
    bucket: Option<String>,
    channel: Option<String>,
    playlist_name: Option<String>,
    expiry: Expiry,
}

impl SignRtmpUrlFluentBuilder {
    pub(crate) fn new(handle: Arc<Handle>) -> Self {
        Self {
            handle,
            bucket: None,
            channel: None,
            playlist_name: None,
            expiry: Expiry::In(DEFAULT_EXPIRES_IN),
        }
    }

    /// Bucket name
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Live channel name
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Playlist to record into
    pub fn playlist_name(mut self, name: impl Into<String>) -> Self {
        self.playlist_name = Some(name.into());
        self
    }

    /// How long the URL stays valid, one hour by default
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expiry = Expiry::In(duration);
        self
    }

    /// Absolute expiry time in seconds since the Unix epoch
    pub fn expires_at(mut self, unix_seconds: i64) -> Self {
        self.expiry = Expiry::At(unix_seconds);
        self
    }

    /// Create the URL
    #[tracing::instrument(skip_all, level = "debug", name = "sign-rtmp-url")]
    pub async fn send(self) -> Result<String, Error> {
        let bucket = required(self.bucket, "bucket")?;
        let channel = required(self.channel, "channel")?;
        self.handle
            .conn
            .sign_rtmp_url(
                &bucket,
                &channel,
                self.playlist_name.as_deref(),
                self.expiry.unix_seconds(),
            )
            .await
    }
}
