//! Browser-upload POST policy

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jiff::Timestamp;
use osc_core::{Error, Result};
use serde_json::{Value, json};

use crate::endpoint::check_bucket_name;

/// Target URL and form fields of a presigned POST upload
#[derive(Debug, Clone)]
pub struct PresignedPost {
    pub url: url::Url,
    pub form_data: BTreeMap<String, String>,
}

/// Conditions and form fields of a presigned POST upload
#[derive(Debug, Clone)]
pub struct PostPolicy {
    bucket: String,
    expiration: Timestamp,
    conditions: Vec<[String; 3]>,
    content_length_range: Option<(u64, u64)>,
    form_data: BTreeMap<String, String>,
}

impl PostPolicy {
    pub fn new(bucket: &str, expiration: Timestamp) -> Result<Self> {
        check_bucket_name(bucket, false)?;
        let mut form_data = BTreeMap::new();
        form_data.insert("bucket".to_string(), bucket.to_string());
        Ok(Self {
            bucket: bucket.to_string(),
            expiration,
            conditions: vec![["eq".to_string(), "$bucket".to_string(), bucket.to_string()]],
            content_length_range: None,
            form_data,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn condition(&mut self, op: &str, field: &str, form_key: &str, value: &str) {
        self.conditions
            .push([op.to_string(), format!("${field}"), value.to_string()]);
        self.form_data.insert(form_key.to_string(), value.to_string());
    }

    /// Upload must use exactly this key
    pub fn set_key(&mut self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Config("object name cannot be empty".into()));
        }
        self.condition("eq", "key", "key", key);
        Ok(())
    }

    /// Upload key must start with `prefix`
    pub fn set_key_starts_with(&mut self, prefix: &str) {
        self.condition("starts-with", "key", "key", prefix);
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.condition("eq", "Content-Type", "Content-Type", content_type);
    }

    pub fn set_content_type_starts_with(&mut self, prefix: &str) {
        self.condition("starts-with", "Content-Type", "Content-Type", prefix);
    }

    pub fn set_content_length_range(&mut self, min: u64, max: u64) -> Result<()> {
        if min > max {
            return Err(Error::Config(format!(
                "content length range {min}-{max} is invalid"
            )));
        }
        self.content_length_range = Some((min, max));
        Ok(())
    }

    /// Form fields collected so far
    pub fn form_data(&self) -> &BTreeMap<String, String> {
        &self.form_data
    }

    /// Base64 JSON policy document with `extra` eq-conditions appended
    pub(crate) fn encode(&self, extra: &[(&str, &str)]) -> Result<String> {
        if !self.form_data.contains_key("key") {
            return Err(Error::Config("post policy requires a key condition".into()));
        }

        let mut conditions: Vec<Value> = self.conditions.iter().map(|c| json!(c)).collect();
        for (field, value) in extra {
            conditions.push(json!(["eq", format!("${field}"), value]));
        }
        if let Some((min, max)) = self.content_length_range {
            conditions.push(json!(["content-length-range", min, max]));
        }

        let policy = json!({
            "expiration": self.expiration.strftime("%Y-%m-%dT%H:%M:%S.000Z").to_string(),
            "conditions": conditions,
        });
        Ok(STANDARD.encode(serde_json::to_vec(&policy)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(policy: &str) -> Value {
        serde_json::from_slice(&STANDARD.decode(policy).unwrap()).unwrap()
    }

    #[test]
    fn test_policy_document() {
        let expiration: Timestamp = "2024-05-01T12:00:00Z".parse().unwrap();
        let mut policy = PostPolicy::new("photos", expiration).unwrap();
        policy.set_key_starts_with("uploads/");
        policy.set_content_type("image/png");
        policy.set_content_length_range(1, 1024).unwrap();

        let doc = decode(&policy.encode(&[("x-amz-algorithm", "AWS4-HMAC-SHA256")]).unwrap());
        assert_eq!(doc["expiration"], "2024-05-01T12:00:00.000Z");
        let conditions = doc["conditions"].as_array().unwrap();
        assert_eq!(conditions[0], json!(["eq", "$bucket", "photos"]));
        assert_eq!(conditions[1], json!(["starts-with", "$key", "uploads/"]));
        assert_eq!(conditions[2], json!(["eq", "$Content-Type", "image/png"]));
        assert_eq!(conditions[3], json!(["eq", "$x-amz-algorithm", "AWS4-HMAC-SHA256"]));
        assert_eq!(conditions[4], json!(["content-length-range", 1, 1024]));

        assert_eq!(policy.form_data()["key"], "uploads/");
        assert_eq!(policy.form_data()["Content-Type"], "image/png");
    }

    #[test]
    fn test_policy_requires_key() {
        let policy = PostPolicy::new("photos", Timestamp::now()).unwrap();
        assert!(matches!(policy.encode(&[]), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(PostPolicy::new("a", Timestamp::now()).is_err());
        let mut policy = PostPolicy::new("photos", Timestamp::now()).unwrap();
        assert!(policy.set_content_length_range(10, 1).is_err());
        assert!(policy.set_key("").is_err());
    }
}
