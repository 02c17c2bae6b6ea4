//! Multipart upload bookkeeping
//!
//! Part sizing rules and the state of one in-flight multipart upload. The
//! network side lives in [`crate::upload`].

use osc_core::{Error, Result};

use crate::xml;

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: u64 = 10_000;

/// Maximum object size: 5 TiB
pub const MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024 * 1024;

/// Part size and part count for an upload.
///
/// `part_count` is `None` when the length is unknown; it is discovered while
/// reading. With a known length and no hint, the part size is the smallest
/// multiple of [`MIN_PART_SIZE`] that keeps the count within [`MAX_PARTS`].
pub fn part_info(length: Option<u64>, part_size_hint: Option<u64>) -> Result<(u64, Option<u64>)> {
    if let Some(hint) = part_size_hint {
        if hint < MIN_PART_SIZE {
            return Err(Error::Config(format!(
                "part size {hint} is not supported; minimum allowed 5MiB"
            )));
        }
        if hint > MAX_PART_SIZE {
            return Err(Error::Config(format!(
                "part size {hint} is not supported; maximum allowed 5GiB"
            )));
        }
    }

    let Some(length) = length else {
        return Ok((part_size_hint.unwrap_or(MIN_PART_SIZE), None));
    };

    if length > MAX_OBJECT_SIZE {
        return Err(Error::Config(format!(
            "object size {length} is not supported; maximum allowed 5TiB"
        )));
    }

    let part_size = match part_size_hint {
        Some(hint) => hint,
        None => {
            let minimum = length.div_ceil(MAX_PARTS);
            (minimum.div_ceil(MIN_PART_SIZE) * MIN_PART_SIZE).max(MIN_PART_SIZE)
        }
    };

    let part_count = length.div_ceil(part_size).max(1);
    if part_count > MAX_PARTS {
        return Err(Error::Config(format!(
            "object size {length} and part size {part_size} make more than {MAX_PARTS} parts for upload"
        )));
    }
    Ok((part_size, Some(part_count)))
}

/// One uploaded part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// 1-based ordinal
    pub part_number: u64,
    /// ETag as returned by the part upload, without quotes
    pub etag: String,
}

impl Part {
    pub fn new(part_number: u64, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// Multipart upload owned by one put call
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub upload_id: String,
    pub bucket: String,
    pub object: String,
    pub part_size: u64,
    /// Fixed once the last part has been read
    pub part_count: Option<u64>,
    pub parts: Vec<Part>,
}

impl PendingUpload {
    pub fn new(upload_id: impl Into<String>, bucket: &str, object: &str, part_size: u64) -> Self {
        Self {
            upload_id: upload_id.into(),
            bucket: bucket.to_string(),
            object: object.to_string(),
            part_size,
            part_count: None,
            parts: Vec::new(),
        }
    }

    pub fn record(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Parts in ascending order, checked to be exactly `1..=n`
    pub fn ordered_parts(&mut self) -> Result<&[Part]> {
        self.parts.sort_by_key(|p| p.part_number);
        for (i, part) in self.parts.iter().enumerate() {
            if part.part_number != i as u64 + 1 {
                return Err(Error::General(format!(
                    "upload {} has a gap or duplicate at part {}",
                    self.upload_id, part.part_number
                )));
            }
        }
        if let Some(count) = self.part_count {
            if self.parts.len() as u64 != count {
                return Err(Error::General(format!(
                    "upload {} has {} of {count} parts",
                    self.upload_id,
                    self.parts.len()
                )));
            }
        }
        Ok(&self.parts)
    }

    /// CompleteMultipartUpload request body
    pub fn completion_body(&mut self) -> Result<Vec<u8>> {
        let parts = self.ordered_parts()?;
        xml::complete_multipart_upload(parts)
    }
}
