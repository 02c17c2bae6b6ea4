//! osc-s3: request execution and multipart upload engine
//!
//! Everything that speaks the S3 wire protocol lives here: endpoint and
//! region resolution, SigV4 signing, the request executor with its error
//! classification, multipart uploads and paginated listings. [`S3Client`]
//! is the entry point; the other modules are public for callers that need
//! a lower-level handle.

pub mod classify;
pub mod client;
pub mod credentials;
pub mod endpoint;
pub mod executor;
pub mod hash;
pub mod list;
pub mod multipart;
pub mod notification;
pub mod policy;
pub mod pool;
pub mod region;
pub mod signer;
pub mod sse;
pub mod transport;
pub mod types;
pub mod upload;
pub mod xml;

pub use client::{BucketConfig, ClientBuilder, MAX_PRESIGN_EXPIRY, PresignOptions, S3Client};
pub use credentials::{ChainProvider, EnvProvider, StaticProvider};
pub use executor::{RequestExecutor, S3Request};
pub use policy::{PostPolicy, PresignedPost};
pub use region::RegionCache;
pub use sse::{CustomerKey, Sse};
pub use transport::{HttpTransport, TransportOptions};
pub use types::*;
pub use upload::MultipartUploadCoordinator;
