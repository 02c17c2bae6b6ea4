//! Error types for osc-core
//!
//! A single error enum shared by the library and the CLI. S3 service errors
//! keep their structured form so callers can branch on the error code.

use std::fmt;

use thiserror::Error;

/// Result type alias for osc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error returned by an S3-compatible service.
///
/// Either parsed from the XML error document in the response body or
/// synthesized from the HTTP status when the server sent no body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct S3Error {
    /// Machine-readable error code, e.g. `NoSuchKey`
    pub code: String,

    /// Human-readable message
    pub message: String,

    /// Resource path the request targeted
    pub resource: String,

    /// Value of `x-amz-request-id`
    pub request_id: String,

    /// Value of `x-amz-id-2`
    pub host_id: String,

    /// Bucket named by the request, if any
    pub bucket_name: Option<String>,

    /// Object named by the request, if any
    pub object_name: Option<String>,

    /// HTTP status of the response this error came from
    pub status: u16,

    /// Value of `x-amz-bucket-region`, sent by the server on region mismatch
    pub region_hint: Option<String>,
}

impl S3Error {
    /// Copy this error with a different code and message
    pub fn with_code(&self, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S3 operation failed; code: {}, message: {}, resource: {}, request_id: {}, host_id: {}",
            self.code, self.message, self.resource, self.request_id, self.host_id
        )?;
        if let Some(bucket) = &self.bucket_name {
            write!(f, ", bucket_name: {bucket}")?;
        }
        if let Some(object) = &self.object_name {
            write!(f, ", object_name: {object}")?;
        }
        Ok(())
    }
}

impl std::error::Error for S3Error {}

/// Error types for osc operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid caller-supplied argument or configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server answered with a body that is not a usable XML document
    #[error("Invalid response: status {status}, content-type {content_type:?}, body {body:?}")]
    InvalidResponse {
        status: u16,
        content_type: Option<String>,
        body: Option<String>,
    },

    /// Error reported by the S3 service
    #[error("{0}")]
    S3(S3Error),

    /// Unmapped status code with no error document
    #[error("server failed with HTTP status code {status}")]
    Server { status: u16 },

    /// Malformed success document
    #[error("XML error: {0}")]
    Xml(String),

    /// Transport failure after transport-level retries
    #[error("Network error: {0}")]
    Network(String),

    /// Request signing failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Alias not found
    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    /// Alias already exists
    #[error("Alias already exists: {0}")]
    AliasExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// General error
    #[error("{0}")]
    General(String),
}

impl From<S3Error> for Error {
    fn from(err: S3Error) -> Self {
        Error::S3(err)
    }
}

impl Error {
    /// S3 error code, if this is a service error
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::S3(e) => Some(e.code.as_str()),
            _ => None,
        }
    }

    /// Whether this is a service error carrying one of `codes`
    pub fn has_code(&self, codes: &[&str]) -> bool {
        self.code().is_some_and(|c| codes.contains(&c))
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) | Error::Config(_) => 2,
            Error::Network(_) => 3,
            Error::Auth(_) => 4,
            Error::AliasNotFound(_) => 5,
            Error::AliasExists(_) => 6,
            Error::S3(e) => match e.code.as_str() {
                "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" => 4,
                "NoSuchKey" | "NoSuchBucket" | "NoSuchUpload" | "ResourceNotFound" => 5,
                "BucketAlreadyExists" | "BucketAlreadyOwnedByYou" | "BucketNotEmpty"
                | "ResourceConflict" | "PreconditionFailed" => 6,
                _ => 1,
            },
            _ => 1,
        }
    }
}
