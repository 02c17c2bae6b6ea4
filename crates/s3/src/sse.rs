//! Server-side encryption settings

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::{HeaderMap, HeaderName, HeaderValue};
use osc_core::{Error, Result};

use crate::hash::md5_base64;

const ALGORITHM: &str = "x-amz-server-side-encryption";
const KMS_KEY_ID: &str = "x-amz-server-side-encryption-aws-kms-key-id";
const KMS_CONTEXT: &str = "x-amz-server-side-encryption-context";
const CUSTOMER_ALGORITHM: &str = "x-amz-server-side-encryption-customer-algorithm";
const CUSTOMER_KEY: &str = "x-amz-server-side-encryption-customer-key";
const CUSTOMER_KEY_MD5: &str = "x-amz-server-side-encryption-customer-key-md5";
const COPY_CUSTOMER_ALGORITHM: &str = "x-amz-copy-source-server-side-encryption-customer-algorithm";
const COPY_CUSTOMER_KEY: &str = "x-amz-copy-source-server-side-encryption-customer-key";
const COPY_CUSTOMER_KEY_MD5: &str = "x-amz-copy-source-server-side-encryption-customer-key-md5";

/// 256-bit customer-provided key (SSE-C)
#[derive(Clone, PartialEq, Eq)]
pub struct CustomerKey([u8; 32]);

impl CustomerKey {
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: [u8; 32] = key
            .try_into()
            .map_err(|_| Error::Config("SSE-C keys need to be 256 bit base64 encoded".into()))?;
        Ok(Self(key))
    }
}

impl fmt::Debug for CustomerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomerKey(<redacted>)")
    }
}

/// Encryption requested for an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sse {
    /// SSE-S3, server-managed keys
    S3,
    /// SSE-KMS with an optional encryption context
    Kms {
        key_id: String,
        context: Option<BTreeMap<String, String>>,
    },
    /// SSE-C
    Customer(CustomerKey),
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| Error::Config(format!("invalid value for {name}: {e}")))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

impl Sse {
    /// Whether the key material may only travel over TLS
    pub fn tls_required(&self) -> bool {
        !matches!(self, Sse::S3)
    }

    /// Fail unless the connection is HTTPS when it has to be
    pub fn check(&self, https: bool) -> Result<()> {
        if self.tls_required() && !https {
            return Err(Error::Config(
                "SSE-C and SSE-KMS operations must be performed over a secure connection".into(),
            ));
        }
        Ok(())
    }

    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        match self {
            Sse::S3 => insert(&mut headers, ALGORITHM, "AES256")?,
            Sse::Kms { key_id, context } => {
                insert(&mut headers, ALGORITHM, "aws:kms")?;
                insert(&mut headers, KMS_KEY_ID, key_id)?;
                if let Some(context) = context {
                    let json = serde_json::to_vec(context)?;
                    insert(&mut headers, KMS_CONTEXT, &STANDARD.encode(json))?;
                }
            }
            Sse::Customer(CustomerKey(key)) => {
                insert(&mut headers, CUSTOMER_ALGORITHM, "AES256")?;
                insert(&mut headers, CUSTOMER_KEY, &STANDARD.encode(key))?;
                insert(&mut headers, CUSTOMER_KEY_MD5, &md5_base64(key))?;
            }
        }
        Ok(headers)
    }

    /// Headers that decrypt a copy source; empty unless SSE-C
    pub fn copy_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Sse::Customer(CustomerKey(key)) = self {
            insert(&mut headers, COPY_CUSTOMER_ALGORITHM, "AES256")?;
            insert(&mut headers, COPY_CUSTOMER_KEY, &STANDARD.encode(key))?;
            insert(&mut headers, COPY_CUSTOMER_KEY_MD5, &md5_base64(key))?;
        }
        Ok(headers)
    }

    /// Headers sent with each part upload; only SSE-C applies per part
    pub fn part_headers(&self) -> Result<HeaderMap> {
        match self {
            Sse::Customer(_) => self.headers(),
            _ => Ok(HeaderMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_key_length() {
        assert!(CustomerKey::new(&[7u8; 32]).is_ok());
        assert!(matches!(CustomerKey::new(&[7u8; 16]), Err(Error::Config(_))));
    }

    #[test]
    fn test_sse_s3_headers() {
        let headers = Sse::S3.headers().unwrap();
        assert_eq!(headers.get(ALGORITHM).unwrap(), "AES256");
        assert!(Sse::S3.part_headers().unwrap().is_empty());
        assert!(Sse::S3.check(false).is_ok());
    }

    #[test]
    fn test_sse_kms_headers() {
        let mut context = BTreeMap::new();
        context.insert("project".to_string(), "osc".to_string());
        let sse = Sse::Kms {
            key_id: "key-1".to_string(),
            context: Some(context),
        };
        let headers = sse.headers().unwrap();
        assert_eq!(headers.get(ALGORITHM).unwrap(), "aws:kms");
        assert_eq!(headers.get(KMS_KEY_ID).unwrap(), "key-1");
        let encoded = headers.get(KMS_CONTEXT).unwrap().to_str().unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), br#"{"project":"osc"}"#);
        assert!(matches!(sse.check(false), Err(Error::Config(_))));
    }

    #[test]
    fn test_sse_customer_headers() {
        let sse = Sse::Customer(CustomerKey::new(&[1u8; 32]).unwrap());
        let headers = sse.headers().unwrap();
        assert_eq!(headers.get(CUSTOMER_ALGORITHM).unwrap(), "AES256");
        assert_eq!(headers.get(CUSTOMER_KEY_MD5).unwrap().to_str().unwrap(), md5_base64(&[1u8; 32]));
        assert_eq!(sse.part_headers().unwrap().len(), 3);

        let copy = sse.copy_headers().unwrap();
        assert_eq!(copy.get(COPY_CUSTOMER_ALGORITHM).unwrap(), "AES256");
        assert!(sse.check(true).is_ok());
        assert!(sse.check(false).is_err());
    }
}
