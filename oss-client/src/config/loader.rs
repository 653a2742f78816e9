/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use crate::config::Builder;
use crate::credentials::{
    Credentials, EnvironmentProvider, ENV_ACCESS_KEY_ID, ENV_ACCESS_KEY_SECRET, ENV_SESSION_TOKEN,
};
use crate::error::Error;
use crate::types::{AuthVersion, ConcurrencySetting, PartSize};
use crate::Config;

const ENV_ENDPOINT: &str = "OSS_ENDPOINT";

/// Load client [`Config`] from the environment.
///
/// The endpoint comes from `OSS_ENDPOINT` and credentials from `OSS_ACCESS_KEY_ID`,
/// `OSS_ACCESS_KEY_SECRET` and `OSS_SESSION_TOKEN` unless explicitly overridden.
#[derive(Default, Debug)]
pub struct ConfigLoader {
    builder: Builder,
    endpoint_set: bool,
    credentials_set: bool,
    refresh_credentials: bool,
}

impl ConfigLoader {
    /// Override the endpoint instead of reading `OSS_ENDPOINT`
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.builder = self.builder.endpoint(endpoint);
        self.endpoint_set = true;
        self
    }

    /// Override the credentials instead of reading them from the environment
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.builder = self.builder.credentials(credentials);
        self.credentials_set = true;
        self
    }

    /// Re-read the credential variables on every request instead of once at load time
    pub fn refresh_credentials(mut self, refresh: bool) -> Self {
        self.refresh_credentials = refresh;
        self
    }

    /// Signature scheme
    pub fn auth_version(mut self, version: AuthVersion) -> Self {
        self.builder = self.builder.auth_version(version);
        self
    }

    /// Default part size for multipart uploads.
    ///
    /// Default is [PartSize::Auto]
    pub fn part_size(mut self, part_size: PartSize) -> Self {
        self.builder = self.builder.part_size(part_size);
        self
    }

    /// Set the default number of part workers for multipart uploads.
    ///
    /// Default is [ConcurrencySetting::Auto].
    pub fn concurrency(mut self, concurrency: ConcurrencySetting) -> Self {
        self.builder = self.builder.concurrency(concurrency);
        self
    }

    /// Load the configuration
    ///
    /// If fields have been overridden during builder construction, the override values will be
    /// used. Otherwise, the values are read from the environment.
    pub fn load(self) -> Result<Config, Error> {
        let mut builder = self.builder;
        if !self.endpoint_set {
            if let Ok(endpoint) = std::env::var(ENV_ENDPOINT) {
                builder = builder.endpoint(endpoint);
            }
        }

        if !self.credentials_set {
            if self.refresh_credentials {
                builder = builder.credentials_provider(Arc::new(EnvironmentProvider));
            } else if let (Ok(id), Ok(secret)) = (
                std::env::var(ENV_ACCESS_KEY_ID),
                std::env::var(ENV_ACCESS_KEY_SECRET),
            ) {
                let token = std::env::var(ENV_SESSION_TOKEN).ok();
                builder = builder.credentials(Credentials::new(id, secret, token));
            }
        }

        tracing::debug!("loaded client configuration from the environment");
        builder.build()
    }
}

#[cfg(test)]
mod test {
    use super::ConfigLoader;
    use crate::credentials::Credentials;

    #[test]
    fn test_explicit_values_win() {
        let config = ConfigLoader::default()
            .endpoint("https://oss-cn-beijing.aliyuncs.com")
            .credentials(Credentials::new("ak", "sk", None))
            .load()
            .unwrap();
        assert_eq!("https://oss-cn-beijing.aliyuncs.com", config.endpoint());
    }
}
