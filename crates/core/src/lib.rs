//! osc-core: shared types for the osc S3 client
//!
//! This crate holds everything that does not depend on a concrete HTTP
//! stack:
//! - Configuration and alias management
//! - Path parsing for the command line
//! - The error type shared by the library and the CLI
//! - Capability traits (transport, signer, credential provider, byte source)

pub mod alias;
pub mod config;
pub mod error;
pub mod http;
pub mod path;
pub mod source;
pub mod traits;

pub use alias::{Alias, AliasManager, BucketLookup, RetryConfig, TimeoutConfig};
pub use config::{Config, ConfigManager, Defaults};
pub use error::{Error, Result, S3Error};
pub use http::{HttpRequest, HttpResponse, ResponseBody};
pub use path::{Location, RemotePath, parse_path, parse_remote};
pub use source::{ReaderSource, StreamSource};
pub use traits::{ByteSource, CredentialProvider, Credentials, ProgressObserver, Signer, Transport};
