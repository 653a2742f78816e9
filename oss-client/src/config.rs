/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::credentials::{Credentials, SharedCredentialsProvider, StaticProvider};
use crate::error::{self, Error};
use crate::http::SharedHttpTransport;
use crate::runtime::token_bucket::TokenBucket;
use crate::types::{AuthVersion, ByteUnit, ConcurrencySetting, PartSize};

/// Load [`Config`] from the environment
pub mod loader;

const DEFAULT_MD5_THRESHOLD: u64 = ByteUnit::Mebibyte.times(16);
const DEFAULT_MAX_IDLE_CONNS_PER_HOST: usize = 100;

/// Timeouts applied by the request engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTimeout {
    /// Time allowed to establish a connection
    pub connect: Duration,
    /// Time allowed for each read of the request body and each chunk of the response body
    pub read_write: Duration,
    /// Time allowed for the response headers to arrive once the request body has been sent
    pub header: Duration,
    /// How long an idle pooled connection is kept
    pub idle_conn: Duration,
    /// Longest time the request body may go without progress while it is sent
    pub long: Duration,
}

impl Default for HttpTimeout {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            read_write: Duration::from_secs(60),
            header: Duration::from_secs(60),
            idle_conn: Duration::from_secs(50),
            long: Duration::from_secs(300),
        }
    }
}

/// Outbound HTTP proxy
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub(crate) host: String,
    pub(crate) user: Option<String>,
    pub(crate) password: Option<String>,
}

impl ProxyConfig {
    /// Proxy without authentication
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            password: None,
        }
    }

    /// Proxy using basic authentication
    pub fn with_auth(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: Some(user.into()),
            password: Some(password.into()),
        }
    }

    /// The proxy URL
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Configuration for a [`Client`](crate::client::Client)
#[derive(Debug, Clone)]
pub struct Config {
    endpoint: String,
    credentials_provider: SharedCredentialsProvider,
    is_cname: bool,
    is_path_style: bool,
    proxy: Option<ProxyConfig>,
    timeout: HttpTimeout,
    max_idle_conns_per_host: usize,
    md5_enabled: bool,
    md5_threshold: u64,
    crc_enabled: bool,
    auth_version: AuthVersion,
    additional_headers: Vec<String>,
    upload_limiter: Option<Arc<TokenBucket>>,
    download_limiter: Option<Arc<TokenBucket>>,
    user_agent: String,
    local_address: Option<IpAddr>,
    insecure_skip_verify: bool,
    redirect_enabled: bool,
    part_size: PartSize,
    concurrency: ConcurrencySetting,
    transport: Option<SharedHttpTransport>,
}

impl Config {
    /// Create a new `Config` builder
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The service endpoint, `[http(s)://]host[:port]`
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Provider consulted for every signed request
    pub fn credentials_provider(&self) -> &SharedCredentialsProvider {
        &self.credentials_provider
    }

    /// Whether the endpoint is a custom domain bound to a single bucket
    pub fn is_cname(&self) -> bool {
        self.is_cname
    }

    /// Whether requests use path-style addressing (`host/bucket/object`)
    pub fn is_path_style(&self) -> bool {
        self.is_path_style
    }

    /// Outbound proxy, if any
    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    /// Transport timeouts
    pub fn timeout(&self) -> &HttpTimeout {
        &self.timeout
    }

    /// Maximum idle pooled connections per host
    pub fn max_idle_conns_per_host(&self) -> usize {
        self.max_idle_conns_per_host
    }

    /// Whether `Content-MD5` is computed for request bodies
    pub fn md5_enabled(&self) -> bool {
        self.md5_enabled
    }

    /// Bodies larger than this are spilled to a temporary file to compute their MD5
    pub fn md5_threshold(&self) -> u64 {
        self.md5_threshold
    }

    /// Whether CRC64 end to end checks are enabled
    pub fn crc_enabled(&self) -> bool {
        self.crc_enabled
    }

    /// Signature scheme
    pub fn auth_version(&self) -> AuthVersion {
        self.auth_version
    }

    /// Lowercased names of extra headers to sign with [`AuthVersion::V2`]
    pub fn additional_headers(&self) -> &[String] {
        &self.additional_headers
    }

    pub(crate) fn upload_limiter(&self) -> Option<&Arc<TokenBucket>> {
        self.upload_limiter.as_ref()
    }

    pub(crate) fn download_limiter(&self) -> Option<&Arc<TokenBucket>> {
        self.download_limiter.as_ref()
    }

    /// `User-Agent` sent with every request
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Local address to bind outgoing connections to
    pub fn local_address(&self) -> Option<IpAddr> {
        self.local_address
    }

    /// Whether TLS certificate verification is disabled
    pub fn insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify
    }

    /// Whether the transport follows HTTP redirects
    pub fn redirect_enabled(&self) -> bool {
        self.redirect_enabled
    }

    /// Default part size for multipart uploads
    pub fn part_size(&self) -> &PartSize {
        &self.part_size
    }

    /// Default number of part workers for multipart uploads
    pub fn concurrency(&self) -> &ConcurrencySetting {
        &self.concurrency
    }

    pub(crate) fn transport(&self) -> Option<&SharedHttpTransport> {
        self.transport.as_ref()
    }
}

/// Fluent style builder for [Config]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    endpoint: Option<String>,
    credentials_provider: Option<SharedCredentialsProvider>,
    is_cname: bool,
    is_path_style: bool,
    proxy: Option<ProxyConfig>,
    timeout: Option<HttpTimeout>,
    max_idle_conns_per_host: Option<usize>,
    md5_enabled: bool,
    md5_threshold: Option<u64>,
    crc_disabled: bool,
    auth_version: AuthVersion,
    additional_headers: Vec<String>,
    upload_limit_kbps: Option<u64>,
    download_limit_kbps: Option<u64>,
    user_agent: Option<String>,
    local_address: Option<IpAddr>,
    insecure_skip_verify: bool,
    redirect_disabled: bool,
    part_size: PartSize,
    concurrency: ConcurrencySetting,
    transport: Option<SharedHttpTransport>,
}

impl Builder {
    /// Service endpoint, e.g. `https://oss-cn-hangzhou.aliyuncs.com`. The scheme defaults to `http`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sign requests with a fixed access key pair
    pub fn credentials(self, credentials: Credentials) -> Self {
        self.credentials_provider(Arc::new(StaticProvider::new(credentials)))
    }

    /// Sign requests with credentials from a custom provider
    pub fn credentials_provider(mut self, provider: SharedCredentialsProvider) -> Self {
        self.credentials_provider = Some(provider);
        self
    }

    /// Treat the endpoint as a custom domain bound to a bucket
    pub fn cname(mut self, is_cname: bool) -> Self {
        self.is_cname = is_cname;
        self
    }

    /// Use path-style addressing regardless of the endpoint type
    pub fn path_style(mut self, is_path_style: bool) -> Self {
        self.is_path_style = is_path_style;
        self
    }

    /// Route requests through a proxy
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Override the transport timeouts
    pub fn timeout(mut self, timeout: HttpTimeout) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cap on idle pooled connections per host. Default is 100.
    pub fn max_idle_conns_per_host(mut self, max: usize) -> Self {
        self.max_idle_conns_per_host = Some(max);
        self
    }

    /// Compute `Content-MD5` for request bodies that don't carry one. Default is off.
    pub fn md5(mut self, enabled: bool) -> Self {
        self.md5_enabled = enabled;
        self
    }

    /// Bodies larger than `threshold` bytes are spilled to a temporary file to compute their
    /// MD5. Default is 16 MiB.
    pub fn md5_threshold(mut self, threshold: u64) -> Self {
        self.md5_threshold = Some(threshold);
        self
    }

    /// Enable or disable CRC64 end to end checks. Default is on.
    pub fn crc(mut self, enabled: bool) -> Self {
        self.crc_disabled = !enabled;
        self
    }

    /// Signature scheme. Default is [`AuthVersion::V1`].
    pub fn auth_version(mut self, version: AuthVersion) -> Self {
        self.auth_version = version;
        self
    }

    /// Extra header names to sign with [`AuthVersion::V2`]
    pub fn additional_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.additional_headers = names
            .into_iter()
            .map(|n| n.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Limit upload bandwidth to `kbps` kilobytes per second
    pub fn upload_limit_speed(mut self, kbps: u64) -> Self {
        self.upload_limit_kbps = Some(kbps);
        self
    }

    /// Limit download bandwidth to `kbps` kilobytes per second
    pub fn download_limit_speed(mut self, kbps: u64) -> Self {
        self.download_limit_kbps = Some(kbps);
        self
    }

    /// Override the `User-Agent`
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Bind outgoing connections to a local address
    pub fn local_address(mut self, addr: IpAddr) -> Self {
        self.local_address = Some(addr);
        self
    }

    /// Disable TLS certificate verification. DO NOT USE IN PRODUCTION.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Whether the transport follows redirects. Default is true.
    pub fn redirect(mut self, enabled: bool) -> Self {
        self.redirect_disabled = !enabled;
        self
    }

    /// Default part size for multipart uploads. Default is [PartSize::Auto]
    pub fn part_size(mut self, part_size: PartSize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Default number of part workers for multipart uploads.
    /// Default is [ConcurrencySetting::Auto].
    pub fn concurrency(mut self, concurrency: ConcurrencySetting) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set an explicit HTTP transport to use instead of the default one
    pub fn transport(mut self, transport: SharedHttpTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Consumes the builder and constructs a [`Config`](crate::config::Config)
    pub fn build(self) -> Result<Config, Error> {
        let endpoint = self
            .endpoint
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| error::invalid_input("endpoint is required"))?;
        let credentials_provider = self
            .credentials_provider
            .ok_or_else(|| error::invalid_input("credentials are required"))?;

        if self.auth_version == AuthVersion::V4 {
            return Err(error::invalid_input(
                "auth version v4 is not supported, use v1 or v2",
            ));
        }

        let limiter = |kbps: Option<u64>| {
            kbps.filter(|k| *k > 0)
                .map(|k| Arc::new(TokenBucket::new(ByteUnit::Kibibyte.times(k))))
        };

        Ok(Config {
            endpoint: endpoint.trim().to_owned(),
            credentials_provider,
            is_cname: self.is_cname,
            is_path_style: self.is_path_style,
            proxy: self.proxy,
            timeout: self.timeout.unwrap_or_default(),
            max_idle_conns_per_host: self
                .max_idle_conns_per_host
                .unwrap_or(DEFAULT_MAX_IDLE_CONNS_PER_HOST),
            md5_enabled: self.md5_enabled,
            md5_threshold: self.md5_threshold.unwrap_or(DEFAULT_MD5_THRESHOLD),
            crc_enabled: !self.crc_disabled,
            auth_version: self.auth_version,
            additional_headers: self.additional_headers,
            upload_limiter: limiter(self.upload_limit_kbps),
            download_limiter: limiter(self.download_limit_kbps),
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
            local_address: self.local_address,
            insecure_skip_verify: self.insecure_skip_verify,
            redirect_enabled: !self.redirect_disabled,
            part_size: self.part_size,
            concurrency: self.concurrency,
            transport: self.transport,
        })
    }
}

fn default_user_agent() -> String {
    format!(
        "oss-client-rs/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[cfg(test)]
mod test {
    use crate::credentials::Credentials;
    use crate::error::ErrorKind;
    use crate::types::AuthVersion;

    fn builder() -> super::Builder {
        super::Config::builder()
            .endpoint("oss-cn-hangzhou.aliyuncs.com")
            .credentials(Credentials::new("ak", "sk", None))
    }

    #[test]
    fn test_defaults() {
        let config = builder().build().unwrap();
        assert!(config.crc_enabled());
        assert!(!config.md5_enabled());
        assert_eq!(16 * 1024 * 1024, config.md5_threshold());
        assert_eq!(AuthVersion::V1, config.auth_version());
        assert!(config.redirect_enabled());
        assert!(config.user_agent().starts_with("oss-client-rs/"));
        assert!(config.upload_limiter().is_none());
    }

    #[test]
    fn test_v4_rejected() {
        let err = builder().auth_version(AuthVersion::V4).build().unwrap_err();
        assert_eq!(&ErrorKind::InputInvalid, err.kind());
    }

    #[test]
    fn test_endpoint_required() {
        let err = super::Config::builder()
            .credentials(Credentials::new("ak", "sk", None))
            .build()
            .unwrap_err();
        assert_eq!(&ErrorKind::InputInvalid, err.kind());
    }

    #[test]
    fn test_additional_headers_lowercased() {
        let config = builder()
            .additional_headers(["Host", "X-Custom"])
            .build()
            .unwrap();
        assert_eq!(&["host".to_owned(), "x-custom".to_owned()], config.additional_headers());
    }
}
