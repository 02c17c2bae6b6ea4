//! Capability traits
//!
//! The client never talks to the network, the signing algorithm, or a
//! credential store directly. Each of those is a trait here so that the
//! request pipeline can be driven by mocks in tests and swapped in production.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use jiff::Timestamp;
use url::Url;

use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};

/// Access credentials for a single request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

// Keep secrets out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Sends requests over the wire.
///
/// Implementations own connection pooling, TLS, and retrying transient
/// connection failures. Any HTTP status is a successful send.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Request signing algorithm
pub trait Signer: Send + Sync {
    /// Sign `request` and return its complete header set
    fn sign(
        &self,
        request: &HttpRequest,
        region: &str,
        credentials: &Credentials,
        payload_hash: &str,
        timestamp: Timestamp,
    ) -> Result<HeaderMap>;

    /// Embed a time-limited signature into `url`
    fn presign(
        &self,
        method: &Method,
        url: &Url,
        region: &str,
        credentials: &Credentials,
        timestamp: Timestamp,
        expiry_seconds: u64,
    ) -> Result<Url>;

    /// Signature over a base64-encoded POST policy document
    fn sign_post_policy(
        &self,
        policy_base64: &str,
        credentials: &Credentials,
        timestamp: Timestamp,
        region: &str,
    ) -> Result<String>;
}

/// Source of credentials, consulted once per request.
///
/// `Ok(None)` means anonymous access: requests go out unsigned.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn retrieve(&self) -> Result<Option<Credentials>>;
}

/// Pull-based byte input for uploads
#[async_trait]
pub trait ByteSource: Send {
    /// Read up to `size` bytes.
    ///
    /// A result shorter than `size` means the source is exhausted.
    async fn read(&mut self, size: usize) -> Result<Bytes>;
}

/// Advisory upload progress sink
pub trait ProgressObserver: Send + Sync {
    /// Called once before any data is read
    fn set_meta(&self, object_name: &str, total_length: Option<u64>);

    /// Called for every chunk read from the source
    fn update(&self, bytes: u64);
}
