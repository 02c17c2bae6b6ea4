//! Public request options and result types

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue};
use jiff::Timestamp;
use osc_core::{Error, ProgressObserver, Result};

use crate::sse::{CustomerKey, Sse};

/// Default content type for uploads
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Default number of concurrent part uploads
pub const DEFAULT_PARALLEL_UPLOADS: usize = 3;

/// Headers passed through as-is when given as metadata
const PASSTHROUGH_HEADERS: [&str; 6] = [
    "cache-control",
    "content-encoding",
    "content-type",
    "content-disposition",
    "content-language",
    "expires",
];

/// Remove surrounding quotes from an ETag
pub fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// Parse an RFC 7231 HTTP date, e.g. `Wed, 21 Oct 2015 07:28:00 GMT`
pub fn parse_http_date(value: &str) -> Option<Timestamp> {
    jiff::fmt::rfc2822::parse(value).ok().map(|zoned| zoned.timestamp())
}

/// Format a timestamp as an RFC 7231 HTTP date
pub fn http_date(timestamp: Timestamp) -> Result<String> {
    jiff::fmt::rfc2822::DateTimePrinter::new()
        .timestamp_to_rfc9110_string(&timestamp)
        .map_err(|e| Error::General(format!("failed to format HTTP date: {e}")))
}

/// Parse an ISO 8601 timestamp as found in XML listings
pub fn parse_iso8601(value: Option<&str>) -> Option<Timestamp> {
    value.and_then(|v| v.parse().ok())
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::Config(format!("invalid metadata key '{name}': {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| Error::Config(format!("invalid metadata value for '{name}': {e}")))?;
    headers.insert(name, value);
    Ok(())
}

/// Turn user metadata into request headers.
///
/// Keys that are already `x-amz-*` or standard content headers pass through;
/// everything else gets the `x-amz-meta-` prefix.
pub fn metadata_headers(metadata: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in metadata {
        let lower = key.to_ascii_lowercase();
        let name = if lower.starts_with("x-amz-") || PASSTHROUGH_HEADERS.contains(&lower.as_str()) {
            lower
        } else {
            format!("x-amz-meta-{lower}")
        };
        insert_header(&mut headers, &name, value)?;
    }
    Ok(headers)
}

/// Options for put_object / fput_object
#[derive(Clone)]
pub struct PutObjectOptions {
    /// Defaults to [`DEFAULT_CONTENT_TYPE`]
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub sse: Option<Sse>,
    /// Part size hint, at least 5 MiB
    pub part_size: Option<u64>,
    /// Parts uploaded concurrently; 1 uploads in order on the caller's task
    pub parallel_uploads: usize,
    pub progress: Option<Arc<dyn ProgressObserver>>,
}

impl Default for PutObjectOptions {
    fn default() -> Self {
        Self {
            content_type: None,
            metadata: BTreeMap::new(),
            sse: None,
            part_size: None,
            parallel_uploads: DEFAULT_PARALLEL_UPLOADS,
            progress: None,
        }
    }
}

impl fmt::Debug for PutObjectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutObjectOptions")
            .field("content_type", &self.content_type)
            .field("metadata", &self.metadata)
            .field("sse", &self.sse)
            .field("part_size", &self.part_size)
            .field("parallel_uploads", &self.parallel_uploads)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl PutObjectOptions {
    /// Headers for a single PUT or for creating the multipart upload
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = metadata_headers(&self.metadata)?;
        let content_type = self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
        insert_header(&mut headers, "content-type", content_type)?;
        if let Some(sse) = &self.sse {
            headers.extend(sse.headers()?);
        }
        Ok(headers)
    }
}

/// Options for get_object
#[derive(Debug, Clone, Default)]
pub struct GetObjectOptions {
    pub offset: u64,
    /// Bytes to read from `offset`; `None` reads to the end
    pub length: Option<u64>,
    pub headers: BTreeMap<String, String>,
    pub ssec: Option<CustomerKey>,
    pub version_id: Option<String>,
}

impl GetObjectOptions {
    /// `Range` header value, if a range was requested
    pub fn range(&self) -> Option<String> {
        match (self.offset, self.length.filter(|l| *l > 0)) {
            (0, None) => None,
            (offset, None) => Some(format!("bytes={offset}-")),
            (offset, Some(length)) => Some(format!("bytes={offset}-{}", offset + length - 1)),
        }
    }

    pub fn request_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            insert_header(&mut headers, name, value)?;
        }
        if let Some(range) = self.range() {
            insert_header(&mut headers, "range", &range)?;
        }
        if let Some(key) = &self.ssec {
            headers.extend(Sse::Customer(key.clone()).headers()?);
        }
        Ok(headers)
    }
}

/// Preconditions for copy_object
#[derive(Debug, Clone, Default)]
pub struct CopyConditions {
    pub match_etag: Option<String>,
    pub not_match_etag: Option<String>,
    pub modified_since: Option<Timestamp>,
    pub unmodified_since: Option<Timestamp>,
}

impl CopyConditions {
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(etag) = &self.match_etag {
            insert_header(&mut headers, "x-amz-copy-source-if-match", etag)?;
        }
        if let Some(etag) = &self.not_match_etag {
            insert_header(&mut headers, "x-amz-copy-source-if-none-match", etag)?;
        }
        if let Some(ts) = self.modified_since {
            insert_header(&mut headers, "x-amz-copy-source-if-modified-since", &http_date(ts)?)?;
        }
        if let Some(ts) = self.unmodified_since {
            insert_header(&mut headers, "x-amz-copy-source-if-unmodified-since", &http_date(ts)?)?;
        }
        Ok(headers)
    }
}

/// Source object of a server-side copy
#[derive(Debug, Clone, Default)]
pub struct CopySource {
    pub bucket: String,
    pub object: String,
    pub version_id: Option<String>,
    pub conditions: CopyConditions,
    /// SSE-C key the source was written with
    pub ssec: Option<CustomerKey>,
}

impl CopySource {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
            ..Default::default()
        }
    }
}

/// Listing options
#[derive(Debug, Clone, Default)]
pub struct ListObjectsOptions {
    pub prefix: Option<String>,
    /// Walk the whole hierarchy instead of stopping at `/`
    pub recursive: bool,
    pub start_after: Option<String>,
    /// MinIO extension; ListObjectsV2 only
    pub include_user_meta: bool,
    pub include_version: bool,
    pub use_api_v1: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub name: String,
    pub creation_date: Option<Timestamp>,
}

/// Result of stat_object
#[derive(Debug, Clone, Default)]
pub struct ObjectStat {
    pub bucket: String,
    pub object: String,
    pub size: u64,
    /// Without quotes
    pub etag: String,
    pub last_modified: Option<Timestamp>,
    pub content_type: Option<String>,
    pub version_id: Option<String>,
    /// `x-amz-meta-*` headers, keyed by full header name
    pub metadata: BTreeMap<String, String>,
}

/// Result of an object write (put, copy, multipart completion)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectWriteResult {
    pub bucket: String,
    pub object: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
    pub last_modified: Option<Timestamp>,
}

/// One listing entry: an object, a version, a delete marker or a prefix
#[derive(Debug, Clone, Default)]
pub struct ObjectInfo {
    pub bucket: String,
    pub key: String,
    pub last_modified: Option<Timestamp>,
    pub etag: Option<String>,
    pub size: u64,
    pub storage_class: Option<String>,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    pub version_id: Option<String>,
    pub is_latest: bool,
    pub is_delete_marker: bool,
    /// Common prefix rather than an object
    pub is_dir: bool,
    pub metadata: BTreeMap<String, String>,
}

/// Key (and version) to delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteObject {
    pub name: String,
    pub version_id: Option<String>,
}

impl DeleteObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_id: None,
        }
    }

    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }
}

/// Per-key failure reported by remove_objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteError {
    pub code: String,
    pub message: String,
    pub name: Option<String>,
    pub version_id: Option<String>,
}

/// Multipart upload that was started but not completed
#[derive(Debug, Clone)]
pub struct IncompleteUpload {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub initiated: Option<Timestamp>,
}

/// Part of an incomplete upload, as reported by list_parts
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub part_number: u64,
    pub etag: String,
    pub size: u64,
    pub last_modified: Option<Timestamp>,
}
