//! Credential providers

use std::sync::Arc;

use async_trait::async_trait;
use osc_core::{CredentialProvider, Credentials, Result};

/// Fixed credentials
#[derive(Debug, Clone)]
pub struct StaticProvider {
    credentials: Credentials,
}

impl StaticProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    async fn retrieve(&self) -> Result<Option<Credentials>> {
        Ok(Some(self.credentials.clone()))
    }
}

/// Credentials from `AWS_*` or `MINIO_*` environment variables, read on
/// every call.
#[derive(Debug, Default, Clone)]
pub struct EnvProvider;

impl EnvProvider {
    fn first_set(names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.is_empty())
    }
}

#[async_trait]
impl CredentialProvider for EnvProvider {
    async fn retrieve(&self) -> Result<Option<Credentials>> {
        let access_key = Self::first_set(&["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY", "MINIO_ACCESS_KEY"]);
        let secret_key = Self::first_set(&["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY", "MINIO_SECRET_KEY"]);
        let (Some(access_key), Some(secret_key)) = (access_key, secret_key) else {
            return Ok(None);
        };
        let mut credentials = Credentials::new(access_key, secret_key);
        if let Some(token) = Self::first_set(&["AWS_SESSION_TOKEN"]) {
            credentials = credentials.with_session_token(token);
        }
        Ok(Some(credentials))
    }
}

/// First provider that yields credentials wins
#[derive(Clone, Default)]
pub struct ChainProvider {
    providers: Vec<Arc<dyn CredentialProvider>>,
}

impl ChainProvider {
    pub fn new(providers: Vec<Arc<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    pub fn push(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

#[async_trait]
impl CredentialProvider for ChainProvider {
    async fn retrieve(&self) -> Result<Option<Credentials>> {
        for provider in &self.providers {
            if let Some(credentials) = provider.retrieve().await? {
                return Ok(Some(credentials));
            }
        }
        Ok(None)
    }
}
