//! Bucket region cache
//!
//! Entries are created by a successful location lookup or by bucket
//! creation, and evicted when a request shows the bucket is gone or has
//! moved. There is no expiry.

use dashmap::DashMap;
use osc_core::{Error, Result};
use serde::Deserialize;

use crate::endpoint::DEFAULT_REGION;

/// Region reported by GetBucketLocation for the legacy `EU` constraint
pub const LEGACY_EU_REGION: &str = "eu-west-1";

/// Concurrent bucket name to region map owned by one client
#[derive(Debug, Default)]
pub struct RegionCache {
    regions: DashMap<String, String>,
}

impl RegionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: &str) -> Option<String> {
        self.regions.get(bucket).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, bucket: &str) -> bool {
        self.regions.contains_key(bucket)
    }

    pub fn insert(&self, bucket: &str, region: &str) {
        self.regions.insert(bucket.to_string(), region.to_string());
    }

    pub fn evict(&self, bucket: &str) {
        if self.regions.remove(bucket).is_some() {
            tracing::debug!(bucket, "evicted cached region");
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct LocationConstraint {
    #[serde(rename = "$text", default)]
    region: String,
}

/// Parse a GetBucketLocation response body
pub fn parse_location(body: &str) -> Result<String> {
    let location: LocationConstraint = quick_xml::de::from_str(body)
        .map_err(|e| Error::Xml(format!("invalid LocationConstraint document: {e}")))?;
    let region = match location.region.trim() {
        "" => DEFAULT_REGION,
        "EU" => LEGACY_EU_REGION,
        other => other,
    };
    Ok(region.to_string())
}
