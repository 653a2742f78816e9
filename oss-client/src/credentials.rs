/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{self, Error};

/// Access key pair plus an optional short-lived security token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    access_key_secret: String,
    security_token: Option<String>,
}

impl Credentials {
    /// Create new credentials
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        security_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            security_token: security_token.filter(|t| !t.is_empty()),
        }
    }

    /// The access key id
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The access key secret
    pub fn access_key_secret(&self) -> &str {
        &self.access_key_secret
    }

    /// The security token, if these are temporary credentials
    pub fn security_token(&self) -> Option<&str> {
        self.security_token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"** redacted **")
            .field(
                "security_token",
                &self.security_token.as_ref().map(|_| "** redacted **"),
            )
            .finish()
    }
}

/// Source of [`Credentials`].
///
/// The client calls [`provide_credentials`](ProvideCredentials::provide_credentials) once for
/// every request it signs and never caches the result, rotating tokens take effect on the next
/// request.
#[async_trait]
pub trait ProvideCredentials: Send + Sync + fmt::Debug {
    /// Fetch the credentials to sign the next request with
    async fn provide_credentials(&self) -> Result<Credentials, Error>;
}

/// Shared, type erased credentials provider
pub type SharedCredentialsProvider = Arc<dyn ProvideCredentials>;

/// Provider returning a fixed set of credentials
#[derive(Debug, Clone)]
pub struct StaticProvider {
    credentials: Credentials,
}

impl StaticProvider {
    /// Create a provider that always returns `credentials`
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl ProvideCredentials for StaticProvider {
    async fn provide_credentials(&self) -> Result<Credentials, Error> {
        Ok(self.credentials.clone())
    }
}

/// Provider reading `OSS_ACCESS_KEY_ID`, `OSS_ACCESS_KEY_SECRET` and `OSS_SESSION_TOKEN` from
/// the process environment on every call.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentProvider;

pub(crate) const ENV_ACCESS_KEY_ID: &str = "OSS_ACCESS_KEY_ID";
pub(crate) const ENV_ACCESS_KEY_SECRET: &str = "OSS_ACCESS_KEY_SECRET";
pub(crate) const ENV_SESSION_TOKEN: &str = "OSS_SESSION_TOKEN";

#[async_trait]
impl ProvideCredentials for EnvironmentProvider {
    async fn provide_credentials(&self) -> Result<Credentials, Error> {
        let id = std::env::var(ENV_ACCESS_KEY_ID)
            .map_err(|_| error::invalid_input(format!("{ENV_ACCESS_KEY_ID} is not set")))?;
        let secret = std::env::var(ENV_ACCESS_KEY_SECRET)
            .map_err(|_| error::invalid_input(format!("{ENV_ACCESS_KEY_SECRET} is not set")))?;
        let token = std::env::var(ENV_SESSION_TOKEN).ok();
        Ok(Credentials::new(id, secret, token))
    }
}
