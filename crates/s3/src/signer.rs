//! AWS Signature Version 4 via `aws-sigv4`

use std::time::{Duration, SystemTime};

use aws_sigv4::http_request::{
    PercentEncodingMode, SignableBody, SignableRequest, SignatureLocation, SigningSettings,
    UriPathNormalizationMode, sign,
};
use aws_sigv4::sign::v4;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use jiff::Timestamp;
use osc_core::{Credentials, Error, HttpRequest, Result, Signer};
use url::Url;

/// Payload hash sent for unsigned payloads over HTTPS
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Algorithm name used in POST policy form fields
pub const SIGN_V4_ALGORITHM: &str = "AWS4-HMAC-SHA256";

const SERVICE: &str = "s3";

/// `<access key>/<yyyymmdd>/<region>/s3/aws4_request`
pub fn credential_string(access_key: &str, timestamp: Timestamp, region: &str) -> String {
    format!(
        "{access_key}/{}/{region}/{SERVICE}/aws4_request",
        timestamp.strftime("%Y%m%d")
    )
}

/// `yyyymmddThhmmssZ`
pub fn amz_date(timestamp: Timestamp) -> String {
    timestamp.strftime("%Y%m%dT%H%M%SZ").to_string()
}

fn identity(credentials: &Credentials) -> aws_credential_types::Credentials {
    aws_credential_types::Credentials::new(
        &credentials.access_key,
        &credentials.secret_key,
        credentials.session_token.clone(),
        None,
        "osc",
    )
}

/// S3 flavour of SigV4: single URI encoding, no path normalization
fn s3_settings() -> SigningSettings {
    let mut settings = SigningSettings::default();
    settings.percent_encoding_mode = PercentEncodingMode::Single;
    settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;
    settings
}

/// SigV4 signer for the `s3` service
#[derive(Debug, Default, Clone)]
pub struct SigV4Signer;

impl SigV4Signer {
    pub fn new() -> Self {
        Self
    }
}

impl Signer for SigV4Signer {
    fn sign(
        &self,
        request: &HttpRequest,
        region: &str,
        credentials: &Credentials,
        payload_hash: &str,
        timestamp: Timestamp,
    ) -> Result<HeaderMap> {
        let identity = identity(credentials).into();
        let mut settings = s3_settings();
        settings.signature_location = SignatureLocation::Headers;

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(region)
            .name(SERVICE)
            .time(SystemTime::from(timestamp))
            .settings(settings)
            .build()
            .map_err(|e| Error::Auth(format!("Failed to build signing params: {e}")))?;

        let header_pairs: Vec<(&str, &str)> = request
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v)))
            .collect();

        let body = if payload_hash == UNSIGNED_PAYLOAD {
            SignableBody::UnsignedPayload
        } else {
            SignableBody::Precomputed(payload_hash.to_string())
        };

        let signable = SignableRequest::new(
            request.method.as_str(),
            request.url.as_str(),
            header_pairs.into_iter(),
            body,
        )
        .map_err(|e| Error::Auth(format!("Failed to create signable request: {e}")))?;

        let (instructions, _signature) = sign(signable, &params.into())
            .map_err(|e| Error::Auth(format!("Failed to sign request: {e}")))?
            .into_parts();

        let mut signed = request.headers.clone();
        for (name, value) in instructions.headers() {
            let name = HeaderName::try_from(name)
                .map_err(|e| Error::Auth(format!("Invalid header name: {e}")))?;
            let value = HeaderValue::try_from(value)
                .map_err(|e| Error::Auth(format!("Invalid header value: {e}")))?;
            signed.insert(name, value);
        }
        Ok(signed)
    }

    fn presign(
        &self,
        method: &Method,
        url: &Url,
        region: &str,
        credentials: &Credentials,
        timestamp: Timestamp,
        expiry_seconds: u64,
    ) -> Result<Url> {
        let identity = identity(credentials).into();
        let mut settings = s3_settings();
        settings.signature_location = SignatureLocation::QueryParams;
        settings.expires_in = Some(Duration::from_secs(expiry_seconds));

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(region)
            .name(SERVICE)
            .time(SystemTime::from(timestamp))
            .settings(settings)
            .build()
            .map_err(|e| Error::Auth(format!("Failed to build signing params: {e}")))?;

        let signable = SignableRequest::new(
            method.as_str(),
            url.as_str(),
            std::iter::empty(),
            SignableBody::UnsignedPayload,
        )
        .map_err(|e| Error::Auth(format!("Failed to create signable request: {e}")))?;

        let (instructions, _signature) = sign(signable, &params.into())
            .map_err(|e| Error::Auth(format!("Failed to presign request: {e}")))?
            .into_parts();

        let mut presigned = url.clone();
        {
            let mut query = presigned.query_pairs_mut();
            for (name, value) in instructions.params().iter() {
                query.append_pair(name, value);
            }
        }
        Ok(presigned)
    }

    fn sign_post_policy(
        &self,
        policy_base64: &str,
        credentials: &Credentials,
        timestamp: Timestamp,
        region: &str,
    ) -> Result<String> {
        let signing_key = v4::generate_signing_key(
            &credentials.secret_key,
            SystemTime::from(timestamp),
            region,
            SERVICE,
        );
        Ok(v4::calculate_signature(signing_key, policy_base64.as_bytes()))
    }
}
