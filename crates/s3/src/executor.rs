//! Request execution
//!
//! Every S3 call goes through [`RequestExecutor`]: resolve the bucket region,
//! build and sign headers, dispatch through the transport and classify the
//! response. [`RequestExecutor::execute`] adds the one-shot retry for HEAD
//! requests that hit a bucket whose cached region went stale.

use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, HOST, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use jiff::Timestamp;
use osc_core::{
    CredentialProvider, Credentials, Error, HttpRequest, HttpResponse, Result, S3Error, Signer,
    Transport,
};
use url::Url;

use crate::classify::{RETRY_HEAD, RequestContext, classify, is_success, redirect_code};
use crate::endpoint::{BaseUrl, DEFAULT_REGION, Query};
use crate::hash::{md5_base64, sha256_hex};
use crate::region::{RegionCache, parse_location};
use crate::signer::{UNSIGNED_PAYLOAD, amz_date};

/// Default `User-Agent` value
pub fn default_user_agent() -> String {
    format!(
        "osc/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// One S3 API call before region resolution and signing
#[derive(Debug, Clone, Default)]
pub struct S3Request {
    pub method: Method,
    pub bucket: Option<String>,
    pub object: Option<String>,
    pub query: Query,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl S3Request {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn bucket(mut self, bucket: &str) -> Self {
        self.bucket = Some(bucket.to_string());
        self
    }

    pub fn object(mut self, object: &str) -> Self {
        self.object = Some(object.to_string());
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Add `versionId` when a version is given
    pub fn version_id(self, version_id: Option<&str>) -> Self {
        match version_id {
            Some(v) => self.query("versionId", v),
            None => self,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("invalid value for header '{name}': {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Body with an explicit `Content-MD5`, as configuration PUTs require
    pub fn body_with_md5(self, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();
        let md5 = md5_base64(&body);
        self.header("content-md5", &md5).map(|r| r.body(body))
    }
}

/// `host[:port]` as it appears in the URL
fn host_header(url: &Url) -> Result<HeaderValue> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::Config(format!("URL has no host: {url}")))?;
    let value = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).map_err(|e| Error::Config(format!("invalid host '{value}': {e}")))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::Config(format!("invalid header value: {e}")))
}

fn redacted(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name == AUTHORIZATION || name.as_str() == "x-amz-security-token" {
                "<redacted>".to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.to_string(), value)
        })
        .collect()
}

/// Signs, sends and classifies requests for one client
pub struct RequestExecutor {
    base_url: BaseUrl,
    regions: RegionCache,
    provider: Option<Arc<dyn CredentialProvider>>,
    signer: Arc<dyn Signer>,
    transport: Arc<dyn Transport>,
    user_agent: RwLock<String>,
}

impl RequestExecutor {
    pub fn new(
        base_url: BaseUrl,
        provider: Option<Arc<dyn CredentialProvider>>,
        signer: Arc<dyn Signer>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            base_url,
            regions: RegionCache::new(),
            provider,
            signer,
            transport,
            user_agent: RwLock::new(default_user_agent()),
        }
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub fn regions(&self) -> &RegionCache {
        &self.regions
    }

    pub fn signer(&self) -> &dyn Signer {
        self.signer.as_ref()
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Append `name/version` to the default user agent
    pub fn set_app_info(&self, name: &str, version: &str) -> Result<()> {
        if name.trim().is_empty() || version.trim().is_empty() {
            return Err(Error::Config("Application name/version cannot be empty".into()));
        }
        let value = format!("{} {name}/{version}", default_user_agent());
        header_value(&value)?;
        *self.user_agent.write().unwrap_or_else(PoisonError::into_inner) = value;
        Ok(())
    }

    /// Fresh credentials from the provider, `None` when anonymous
    pub async fn credentials(&self) -> Result<Option<Credentials>> {
        match &self.provider {
            Some(provider) => provider.retrieve().await,
            None => Ok(None),
        }
    }

    /// Region to use for a request to `bucket`.
    ///
    /// A cache miss costs one GetBucketLocation round trip.
    pub async fn get_region(&self, bucket: Option<&str>, explicit: Option<&str>) -> Result<String> {
        if let Some(region) = explicit {
            if let Some(fixed) = self.base_url.region() {
                if fixed != region {
                    return Err(Error::Config(format!(
                        "region must be {fixed}, but passed {region}"
                    )));
                }
            }
            return Ok(region.to_string());
        }

        if let Some(fixed) = self.base_url.region() {
            return Ok(fixed.to_string());
        }

        let Some(bucket) = bucket else {
            return Ok(DEFAULT_REGION.to_string());
        };
        if self.provider.is_none() {
            return Ok(DEFAULT_REGION.to_string());
        }

        if let Some(region) = self.regions.get(bucket) {
            return Ok(region);
        }

        let request = S3Request::new(Method::GET).bucket(bucket).query("location", "");
        let response = self.url_open(&request, DEFAULT_REGION).await?;
        let region = parse_location(&response.text().await?)?;
        tracing::debug!(bucket, region = %region, "resolved bucket region");
        self.regions.insert(bucket, &region);
        Ok(region)
    }

    fn build_headers(
        &self,
        url: &Url,
        request: &S3Request,
        credentials: Option<&Credentials>,
        timestamp: Timestamp,
    ) -> Result<HeaderMap> {
        let mut headers = request.headers.clone();
        headers.insert(HOST, host_header(url)?);
        headers.insert(USER_AGENT, header_value(&self.user_agent())?);

        let body = request.body.as_deref();
        if let Some(body) = body {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        let has_md5 = headers.contains_key("content-md5");
        let (sha256, add_md5) = match credentials {
            Some(_) if self.base_url.is_https() => (Some(UNSIGNED_PAYLOAD.to_string()), !has_md5),
            Some(_) => (Some(sha256_hex(body.unwrap_or_default())), false),
            None => (None, !has_md5),
        };
        if add_md5 {
            if let Some(body) = body {
                headers.insert("content-md5", header_value(&md5_base64(body))?);
            }
        }
        if let Some(sha256) = sha256 {
            headers.insert("x-amz-content-sha256", header_value(&sha256)?);
        }
        if let Some(token) = credentials.and_then(|c| c.session_token.as_deref()) {
            headers.insert("x-amz-security-token", header_value(token)?);
        }
        headers.insert("x-amz-date", header_value(&amz_date(timestamp))?);
        Ok(headers)
    }

    /// Send `request` against `region` once and classify the response.
    ///
    /// A `NoSuchBucket` or [`RETRY_HEAD`] outcome evicts the bucket from the
    /// region cache.
    pub async fn url_open(&self, request: &S3Request, region: &str) -> Result<HttpResponse> {
        let credentials = self.credentials().await?;
        let url = self.base_url.build(
            &request.method,
            region,
            request.bucket.as_deref(),
            request.object.as_deref(),
            &request.query,
        )?;
        let resource = url.path().to_string();
        let timestamp = Timestamp::now();

        let mut http_request = HttpRequest::new(request.method.clone(), url);
        http_request.headers = self.build_headers(&http_request.url, request, credentials.as_ref(), timestamp)?;
        http_request.body = request.body.clone();

        if let Some(credentials) = &credentials {
            let payload_hash = http_request
                .header("x-amz-content-sha256")
                .unwrap_or(UNSIGNED_PAYLOAD)
                .to_string();
            http_request.headers =
                self.signer
                    .sign(&http_request, region, credentials, &payload_hash, timestamp)?;
        }

        tracing::debug!(method = %request.method, url = %http_request.url, region, "sending request");
        tracing::trace!(headers = ?redacted(&http_request.headers), "request headers");

        let response = self.transport.send(http_request).await?;

        tracing::debug!(method = %request.method, status = response.status.as_u16(), "received response");
        tracing::trace!(headers = ?redacted(&response.headers), "response headers");

        if is_success(response.status) {
            return Ok(response);
        }

        let HttpResponse {
            status,
            headers,
            body,
        } = response;
        let body = body.bytes().await?;

        let bucket_cached = request
            .bucket
            .as_deref()
            .is_some_and(|bucket| self.regions.contains(bucket));
        let ctx = RequestContext {
            method: &request.method,
            bucket: request.bucket.as_deref(),
            object: request.object.as_deref(),
            resource: &resource,
        };
        let err = classify(&ctx, status, &headers, &body, bucket_cached);

        if err.has_code(&["NoSuchBucket", RETRY_HEAD]) {
            if let Some(bucket) = &request.bucket {
                self.regions.evict(bucket);
            }
        }
        Err(err)
    }

    /// Resolve the region and send `request`, retrying once when a HEAD
    /// reveals that the cached bucket region is stale.
    pub async fn execute(&self, request: S3Request) -> Result<HttpResponse> {
        let region = self.get_region(request.bucket.as_deref(), None).await?;

        let stale = match self.url_open(&request, &region).await {
            Err(Error::S3(e)) if e.code == RETRY_HEAD => e,
            other => return other,
        };

        let Some(hint) = stale.region_hint.clone() else {
            return Err(self.recode(&request, stale));
        };
        if let Some(bucket) = &request.bucket {
            self.regions.insert(bucket, &hint);
        }
        tracing::debug!(bucket = ?request.bucket, from = %region, to = %hint, "retrying HEAD in bucket region");

        match self.url_open(&request, &hint).await {
            Err(Error::S3(e)) if e.code == RETRY_HEAD => Err(self.recode(&request, e)),
            other => other,
        }
    }

    fn recode(&self, request: &S3Request, err: S3Error) -> Error {
        match redirect_code(
            err.status,
            err.region_hint.as_deref(),
            &request.method,
            request.bucket.as_deref(),
            false,
            false,
        ) {
            Some((code, message)) => Error::S3(err.with_code(code, message)),
            None => Error::Server { status: err.status },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::SigV4Signer;
    use async_trait::async_trait;
    use http::StatusCode;
    use mockall::mock;
    use osc_core::ResponseBody;

    mock! {
        pub Wire {}

        #[async_trait]
        impl Transport for Wire {
            async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    struct Keys;

    #[async_trait]
    impl CredentialProvider for Keys {
        async fn retrieve(&self) -> Result<Option<Credentials>> {
            Ok(Some(Credentials::new("minioadmin", "minioadmin")))
        }
    }

    fn executor(endpoint: &str, transport: MockWire, signed: bool) -> RequestExecutor {
        let provider: Option<Arc<dyn CredentialProvider>> = if signed { Some(Arc::new(Keys)) } else { None };
        RequestExecutor::new(
            BaseUrl::parse(endpoint, None).unwrap(),
            provider,
            Arc::new(SigV4Signer::new()),
            Arc::new(transport),
        )
    }

    fn location_response(region: &str) -> HttpResponse {
        let mut response = HttpResponse::new(StatusCode::OK);
        response.body = ResponseBody::Full(Bytes::from(format!(
            "<LocationConstraint>{region}</LocationConstraint>"
        )));
        response
    }

    #[tokio::test]
    async fn test_region_lookup_happens_once() {
        let mut transport = MockWire::new();
        transport
            .expect_send()
            .withf(|req| req.has_query("location"))
            .times(1)
            .returning(|_| Ok(location_response("eu-central-1")));

        let executor = executor("http://localhost:9000", transport, true);
        assert_eq!(executor.get_region(Some("photos"), None).await.unwrap(), "eu-central-1");
        assert_eq!(executor.get_region(Some("photos"), None).await.unwrap(), "eu-central-1");
    }

    #[tokio::test]
    async fn test_anonymous_or_bucketless_uses_default_region() {
        let mut transport = MockWire::new();
        transport.expect_send().never();

        let anonymous = executor("http://localhost:9000", transport, false);
        assert_eq!(anonymous.get_region(Some("photos"), None).await.unwrap(), "us-east-1");
        assert_eq!(anonymous.get_region(None, None).await.unwrap(), "us-east-1");
    }

    #[tokio::test]
    async fn test_explicit_region_must_match_fixed_region() {
        let executor = RequestExecutor::new(
            BaseUrl::parse("https://s3.eu-west-1.amazonaws.com", None).unwrap(),
            None,
            Arc::new(SigV4Signer::new()),
            Arc::new(MockWire::new()),
        );
        assert_eq!(executor.get_region(Some("photos"), None).await.unwrap(), "eu-west-1");
        assert_eq!(
            executor.get_region(Some("photos"), Some("eu-west-1")).await.unwrap(),
            "eu-west-1"
        );
        assert!(matches!(
            executor.get_region(Some("photos"), Some("us-east-1")).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_headers_signed_over_http() {
        let mut transport = MockWire::new();
        transport
            .expect_send()
            .withf(|req| {
                req.header("authorization").is_some_and(|a| a.starts_with("AWS4-HMAC-SHA256"))
                    && req.header("x-amz-content-sha256") == Some(sha256_hex(b"hello").as_str())
                    && req.header("content-md5").is_none()
                    && req.header("host") == Some("localhost:9000")
                    && req.header("content-length") == Some("5")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(StatusCode::OK)));

        let executor = RequestExecutor::new(
            BaseUrl::parse("http://localhost:9000", Some("us-east-1")).unwrap(),
            Some(Arc::new(Keys)),
            Arc::new(SigV4Signer::new()),
            Arc::new(transport),
        );
        let request = S3Request::new(Method::PUT)
            .bucket("photos")
            .object("hello.txt")
            .body(Bytes::from_static(b"hello"));
        executor.execute(request).await.unwrap();
    }

    #[tokio::test]
    async fn test_unsigned_request_carries_md5() {
        let mut transport = MockWire::new();
        transport
            .expect_send()
            .withf(|req| {
                req.header("authorization").is_none()
                    && req.header("content-md5") == Some(md5_base64(b"hello").as_str())
                    && req.header("x-amz-content-sha256").is_none()
                    && req.header("x-amz-date").is_some()
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(StatusCode::OK)));

        let executor = executor("https://play.min.io", transport, false);
        let request = S3Request::new(Method::PUT)
            .bucket("photos")
            .object("hello.txt")
            .body(Bytes::from_static(b"hello"));
        executor.execute(request).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_such_bucket_evicts_cache() {
        let mut transport = MockWire::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(StatusCode::NOT_FOUND)));

        let executor = executor("http://localhost:9000", transport, true);
        executor.regions().insert("photos", "us-east-1");

        let err = executor
            .execute(S3Request::new(Method::HEAD).bucket("photos"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("NoSuchBucket"));
        assert!(!executor.regions().contains("photos"));
    }

    #[test]
    fn test_set_app_info() {
        let executor = executor("http://localhost:9000", MockWire::new(), false);
        executor.set_app_info("backup", "1.2.0").unwrap();
        assert!(executor.user_agent().ends_with(" backup/1.2.0"));
        assert!(executor.user_agent().starts_with("osc/"));
        assert!(matches!(executor.set_app_info("", "1.0"), Err(Error::Config(_))));
    }

    #[test]
    fn test_request_builder() {
        let request = S3Request::new(Method::GET)
            .bucket("photos")
            .object("a.txt")
            .version_id(Some("v1"))
            .version_id(None)
            .header("x-amz-meta-owner", "alice")
            .unwrap();
        assert_eq!(request.query, vec![("versionId".to_string(), "v1".to_string())]);
        assert_eq!(request.headers.get("x-amz-meta-owner").unwrap(), "alice");
        assert!(S3Request::new(Method::GET).header("bad header", "x").is_err());
    }
}
