//! S3 client
//!
//! [`S3Client`] is a cheap-to-clone handle over one [`RequestExecutor`].
//! Every public operation builds an [`S3Request`] and goes through it, so
//! region resolution, signing and error classification are shared.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::TryStreamExt;
use futures::stream::BoxStream;
use http::Method;
use jiff::Timestamp;
use osc_core::{
    Alias, BucketLookup, ByteSource, CredentialProvider, Credentials, Error, HttpResponse,
    ReaderSource, Result, RetryConfig, Signer, TimeoutConfig, Transport,
};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::credentials::StaticProvider;
use crate::endpoint::{BaseUrl, DEFAULT_REGION, check_bucket_name, encode_path, encode_query};
use crate::executor::{RequestExecutor, S3Request};
use crate::list;
use crate::notification;
use crate::policy::{PostPolicy, PresignedPost};
use crate::signer::{SIGN_V4_ALGORITHM, SigV4Signer, amz_date, credential_string};
use crate::sse::{CustomerKey, Sse};
use crate::transport::{HttpTransport, TransportOptions};
use crate::types::{
    Bucket, CopySource, DeleteError, DeleteObject, GetObjectOptions, IncompleteUpload,
    ListObjectsOptions, ObjectInfo, ObjectStat, ObjectWriteResult, PutObjectOptions,
    UploadedPart, metadata_headers, parse_http_date, parse_iso8601, trim_etag,
};
use crate::upload::MultipartUploadCoordinator;
use crate::xml::{self, CopyObjectResult, DeleteResult, LegalHold, ListAllMyBucketsResult};

/// Longest allowed presigned URL lifetime: 7 days
pub const MAX_PRESIGN_EXPIRY: u64 = 7 * 24 * 60 * 60;

/// Keys per multi-object delete request
const DELETE_BATCH_SIZE: usize = 1000;

/// Map the listed "not found" codes to `None`
fn absent_on<T>(result: Result<T>, codes: &[&str]) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.has_code(codes) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Bucket-level configuration documents, exchanged as opaque XML
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketConfig {
    Notification,
    Encryption,
    Versioning,
    Replication,
    Lifecycle,
    Tagging,
    ObjectLock,
}

impl BucketConfig {
    fn query_key(self) -> &'static str {
        match self {
            BucketConfig::Notification => "notification",
            BucketConfig::Encryption => "encryption",
            BucketConfig::Versioning => "versioning",
            BucketConfig::Replication => "replication",
            BucketConfig::Lifecycle => "lifecycle",
            BucketConfig::Tagging => "tagging",
            BucketConfig::ObjectLock => "object-lock",
        }
    }

    /// Codes meaning the bucket has no such configuration
    fn not_found_codes(self) -> &'static [&'static str] {
        match self {
            BucketConfig::Encryption => &["ServerSideEncryptionConfigurationNotFoundError"],
            BucketConfig::Replication => &["ReplicationConfigurationNotFoundError"],
            BucketConfig::Lifecycle => &["NoSuchLifecycleConfiguration"],
            BucketConfig::Tagging => &["NoSuchTagSet"],
            BucketConfig::ObjectLock => &[
                "ObjectLockConfigurationNotFoundError",
                "NoSuchObjectLockConfiguration",
            ],
            BucketConfig::Notification | BucketConfig::Versioning => &[],
        }
    }
}

/// Options for presigned URLs
#[derive(Debug, Clone)]
pub struct PresignOptions {
    /// Lifetime in seconds, 1 to [`MAX_PRESIGN_EXPIRY`]
    pub expires: u64,
    /// `response-*` overrides, e.g. `response-content-type`
    pub response_headers: BTreeMap<String, String>,
    /// Signing time; defaults to now
    pub request_date: Option<Timestamp>,
    pub version_id: Option<String>,
    pub extra_query: Vec<(String, String)>,
}

impl Default for PresignOptions {
    fn default() -> Self {
        Self {
            expires: MAX_PRESIGN_EXPIRY,
            response_headers: BTreeMap::new(),
            request_date: None,
            version_id: None,
            extra_query: Vec::new(),
        }
    }
}

/// Builder for [`S3Client`]
pub struct ClientBuilder {
    endpoint: String,
    region: Option<String>,
    provider: Option<Arc<dyn CredentialProvider>>,
    transport: Option<Arc<dyn Transport>>,
    signer: Option<Arc<dyn Signer>>,
    app_info: Option<(String, String)>,
    transport_options: TransportOptions,
    bucket_lookup: BucketLookup,
    accelerate: bool,
    dualstack: bool,
}

impl ClientBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: None,
            provider: None,
            transport: None,
            signer: None,
            app_info: None,
            transport_options: TransportOptions::default(),
            bucket_lookup: BucketLookup::Auto,
            accelerate: false,
            dualstack: false,
        }
    }

    /// Fix the region; requests for any other region are rejected
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn credentials(self, credentials: Credentials) -> Self {
        self.provider(Arc::new(StaticProvider::new(credentials)))
    }

    pub fn provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn app_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.app_info = Some((name.into(), version.into()));
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.transport_options.retry = retry;
        self
    }

    pub fn timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.transport_options.timeout = timeout;
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.transport_options.insecure = insecure;
        self
    }

    pub fn ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.transport_options.ca_bundle = Some(path.into());
        self
    }

    pub fn bucket_lookup(mut self, lookup: BucketLookup) -> Self {
        self.bucket_lookup = lookup;
        self
    }

    pub fn accelerate(mut self, enabled: bool) -> Self {
        self.accelerate = enabled;
        self
    }

    pub fn dualstack(mut self, enabled: bool) -> Self {
        self.dualstack = enabled;
        self
    }

    pub fn build(self) -> Result<S3Client> {
        let base_url = BaseUrl::parse(&self.endpoint, self.region.as_deref())?;
        match self.bucket_lookup {
            BucketLookup::Path => base_url.set_virtual_style(false),
            BucketLookup::Dns => base_url.set_virtual_style(true),
            BucketLookup::Auto => {}
        }
        if self.accelerate {
            base_url.set_accelerate(true);
        }
        if self.dualstack {
            base_url.set_dualstack(true);
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.transport_options)?),
        };
        let signer = self.signer.unwrap_or_else(|| Arc::new(SigV4Signer::new()));
        let executor = RequestExecutor::new(base_url, self.provider, signer, transport);
        if let Some((name, version)) = &self.app_info {
            executor.set_app_info(name, version)?;
        }
        Ok(S3Client {
            executor: Arc::new(executor),
        })
    }
}

/// Client for one S3-compatible endpoint
#[derive(Clone)]
pub struct S3Client {
    executor: Arc<RequestExecutor>,
}

impl S3Client {
    pub fn builder(endpoint: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    /// Build a client from a stored alias
    pub fn from_alias(alias: &Alias) -> Result<Self> {
        let mut builder = ClientBuilder::new(&alias.endpoint)
            .bucket_lookup(alias.bucket_lookup)
            .accelerate(alias.accelerate)
            .dualstack(alias.dualstack)
            .insecure(alias.insecure)
            .retry(alias.retry_config())
            .timeout(alias.timeout_config());
        if let Some(region) = &alias.region {
            builder = builder.region(region);
        }
        if let Some(ca_bundle) = &alias.ca_bundle {
            builder = builder.ca_bundle(ca_bundle);
        }
        if !alias.is_anonymous() {
            let mut credentials = Credentials::new(&alias.access_key, &alias.secret_key);
            if let Some(token) = &alias.session_token {
                credentials = credentials.with_session_token(token);
            }
            builder = builder.credentials(credentials);
        }
        builder.build()
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    pub fn set_app_info(&self, name: &str, version: &str) -> Result<()> {
        self.executor.set_app_info(name, version)
    }

    pub fn enable_accelerate_endpoint(&self) {
        self.executor.base_url().set_accelerate(true);
    }

    pub fn disable_accelerate_endpoint(&self) {
        self.executor.base_url().set_accelerate(false);
    }

    pub fn enable_dualstack_endpoint(&self) {
        self.executor.base_url().set_dualstack(true);
    }

    pub fn disable_dualstack_endpoint(&self) {
        self.executor.base_url().set_dualstack(false);
    }

    pub fn enable_virtual_style_endpoint(&self) {
        self.executor.base_url().set_virtual_style(true);
    }

    pub fn disable_virtual_style_endpoint(&self) {
        self.executor.base_url().set_virtual_style(false);
    }

    async fn execute(&self, request: S3Request) -> Result<HttpResponse> {
        self.executor.execute(request).await
    }

    async fn execute_text(&self, request: S3Request) -> Result<String> {
        self.execute(request).await?.text().await
    }

    // Buckets

    /// Create a bucket, optionally in `location` and with object lock
    pub async fn make_bucket(&self, bucket: &str, location: Option<&str>, object_lock: bool) -> Result<()> {
        check_bucket_name(bucket, true)?;
        let fixed = self.executor.base_url().region();
        if let (Some(fixed), Some(location)) = (fixed, location) {
            if fixed != location {
                return Err(Error::Config(format!(
                    "region must be {fixed}, but passed {location}"
                )));
            }
        }
        let location = fixed.or(location).unwrap_or(DEFAULT_REGION).to_string();

        let mut request = S3Request::new(Method::PUT).bucket(bucket);
        if object_lock {
            request = request.header("x-amz-bucket-object-lock-enabled", "true")?;
        }
        if location != DEFAULT_REGION {
            request = request.body(xml::create_bucket_configuration(&location)?);
        }
        self.executor.url_open(&request, &location).await?;
        self.executor.regions().insert(bucket, &location);
        tracing::info!(bucket, location = %location, "created bucket");
        Ok(())
    }

    pub async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let body = self.execute_text(S3Request::new(Method::GET)).await?;
        let result: ListAllMyBucketsResult = xml::parse(&body, "ListAllMyBucketsResult")?;
        Ok(result
            .buckets
            .bucket
            .into_iter()
            .map(|b| Bucket {
                name: b.name,
                creation_date: parse_iso8601(b.creation_date.as_deref()),
            })
            .collect())
    }

    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        check_bucket_name(bucket, false)?;
        let result = self.execute(S3Request::new(Method::HEAD).bucket(bucket)).await;
        Ok(absent_on(result, &["NoSuchBucket"])?.is_some())
    }

    pub async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        check_bucket_name(bucket, false)?;
        self.execute(S3Request::new(Method::DELETE).bucket(bucket)).await?;
        self.executor.regions().evict(bucket);
        Ok(())
    }

    /// Bucket policy as JSON text
    pub async fn get_bucket_policy(&self, bucket: &str) -> Result<String> {
        check_bucket_name(bucket, false)?;
        self.execute_text(S3Request::new(Method::GET).bucket(bucket).query("policy", ""))
            .await
    }

    pub async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        check_bucket_name(bucket, false)?;
        let request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .query("policy", "")
            .body_with_md5(policy.to_string())?;
        self.execute(request).await?;
        Ok(())
    }

    pub async fn delete_bucket_policy(&self, bucket: &str) -> Result<()> {
        check_bucket_name(bucket, false)?;
        self.execute(S3Request::new(Method::DELETE).bucket(bucket).query("policy", ""))
            .await?;
        Ok(())
    }

    /// Configuration document, or `None` when the bucket has none
    pub async fn get_bucket_config(&self, bucket: &str, config: BucketConfig) -> Result<Option<String>> {
        check_bucket_name(bucket, false)?;
        let request = S3Request::new(Method::GET).bucket(bucket).query(config.query_key(), "");
        absent_on(self.execute_text(request).await, config.not_found_codes())
    }

    pub async fn set_bucket_config(&self, bucket: &str, config: BucketConfig, document: &str) -> Result<()> {
        check_bucket_name(bucket, false)?;
        let request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .query(config.query_key(), "")
            .body_with_md5(document.to_string())?;
        self.execute(request).await?;
        Ok(())
    }

    /// Remove a configuration document.
    ///
    /// Notification and object-lock settings are reset by writing an empty
    /// document; versioning can only be suspended, never deleted.
    pub async fn delete_bucket_config(&self, bucket: &str, config: BucketConfig) -> Result<()> {
        match config {
            BucketConfig::Versioning => Err(Error::Config(
                "versioning cannot be deleted; suspend it instead".into(),
            )),
            BucketConfig::Notification => {
                self.set_bucket_config(bucket, config, "<NotificationConfiguration/>")
                    .await
            }
            BucketConfig::ObjectLock => {
                self.set_bucket_config(
                    bucket,
                    config,
                    "<ObjectLockConfiguration><ObjectLockEnabled>Enabled</ObjectLockEnabled></ObjectLockConfiguration>",
                )
                .await
            }
            _ => {
                check_bucket_name(bucket, false)?;
                let request = S3Request::new(Method::DELETE)
                    .bucket(bucket)
                    .query(config.query_key(), "");
                absent_on(self.execute(request).await, config.not_found_codes())?;
                Ok(())
            }
        }
    }

    /// Stream bucket notification records (MinIO extension)
    pub fn listen_bucket_notification(
        &self,
        bucket: &str,
        prefix: &str,
        suffix: &str,
        events: &[String],
    ) -> Result<BoxStream<'static, Result<Value>>> {
        check_bucket_name(bucket, false)?;
        notification::listen_bucket_notification(Arc::clone(&self.executor), bucket, prefix, suffix, events)
    }

    // Objects

    fn check_object(bucket: &str, object: &str) -> Result<()> {
        check_bucket_name(bucket, false)?;
        if object.is_empty() {
            return Err(Error::Config("object name cannot be empty".into()));
        }
        Ok(())
    }

    fn check_ssec(&self, ssec: Option<&CustomerKey>) -> Result<()> {
        if ssec.is_some() && !self.executor.base_url().is_https() {
            return Err(Error::Config(
                "SSE-C operations must be performed over a secure connection".into(),
            ));
        }
        Ok(())
    }

    /// Streaming GET; the caller drains `body`
    pub async fn get_object(&self, bucket: &str, object: &str, options: &GetObjectOptions) -> Result<HttpResponse> {
        Self::check_object(bucket, object)?;
        self.check_ssec(options.ssec.as_ref())?;
        let request = S3Request::new(Method::GET)
            .bucket(bucket)
            .object(object)
            .version_id(options.version_id.as_deref())
            .headers(options.request_headers()?);
        self.execute(request).await
    }

    /// Download into `path`, resuming a previous partial download of the
    /// same object version.
    pub async fn fget_object(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        options: &GetObjectOptions,
    ) -> Result<ObjectStat> {
        Self::check_object(bucket, object)?;
        if path.is_dir() {
            return Err(Error::Config(format!("{} is a directory", path.display())));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let stat = self
            .stat_object(bucket, object, options.ssec.as_ref(), options.version_id.as_deref())
            .await?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(format!(".{}.part.osc", stat.etag));
        let tmp_path = PathBuf::from(tmp_name);

        let mut offset = match tokio::fs::metadata(&tmp_path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        if offset > stat.size {
            tokio::fs::remove_file(&tmp_path).await?;
            offset = 0;
        }
        if offset > 0 {
            tracing::debug!(path = %tmp_path.display(), offset, "resuming download");
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&tmp_path)
            .await?;
        if offset < stat.size {
            let range = GetObjectOptions {
                offset,
                length: None,
                ..options.clone()
            };
            let response = self.get_object(bucket, object, &range).await?;
            let mut chunks = response.body.into_stream();
            while let Some(chunk) = chunks.try_next().await? {
                file.write_all(&chunk).await?;
            }
        }
        file.flush().await?;
        drop(file);

        if tokio::fs::try_exists(path).await? {
            tokio::fs::remove_file(path).await?;
        }
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(stat)
    }

    /// Upload from any byte source; see [`MultipartUploadCoordinator`]
    pub async fn put_object<S: ByteSource>(
        &self,
        bucket: &str,
        object: &str,
        source: S,
        length: Option<u64>,
        options: &PutObjectOptions,
    ) -> Result<ObjectWriteResult> {
        MultipartUploadCoordinator::new(Arc::clone(&self.executor))
            .upload(bucket, object, source, length, options)
            .await
    }

    /// Upload a local file
    pub async fn fput_object(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        options: &PutObjectOptions,
    ) -> Result<ObjectWriteResult> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        self.put_object(bucket, object, ReaderSource::new(file), Some(length), options)
            .await
    }

    pub async fn stat_object(
        &self,
        bucket: &str,
        object: &str,
        ssec: Option<&CustomerKey>,
        version_id: Option<&str>,
    ) -> Result<ObjectStat> {
        Self::check_object(bucket, object)?;
        self.check_ssec(ssec)?;
        let mut request = S3Request::new(Method::HEAD)
            .bucket(bucket)
            .object(object)
            .version_id(version_id);
        if let Some(key) = ssec {
            request = request.headers(Sse::Customer(key.clone()).headers()?);
        }
        let response = self.execute(request).await?;

        let header = |name: &str| response.header(name).map(str::to_string);
        let metadata: BTreeMap<String, String> = response
            .headers
            .iter()
            .filter(|(name, _)| name.as_str().starts_with("x-amz-meta-"))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        Ok(ObjectStat {
            bucket: bucket.to_string(),
            object: object.to_string(),
            size: header("content-length").and_then(|v| v.parse().ok()).unwrap_or(0),
            etag: header("etag").as_deref().map(trim_etag).unwrap_or_default(),
            last_modified: header("last-modified").as_deref().and_then(parse_http_date),
            content_type: header("content-type"),
            version_id: header("x-amz-version-id"),
            metadata,
        })
    }

    pub async fn remove_object(&self, bucket: &str, object: &str, version_id: Option<&str>) -> Result<()> {
        Self::check_object(bucket, object)?;
        let request = S3Request::new(Method::DELETE)
            .bucket(bucket)
            .object(object)
            .version_id(version_id);
        self.execute(request).await?;
        Ok(())
    }

    /// Delete many objects, 1000 per request; returns the keys that failed
    pub async fn remove_objects(
        &self,
        bucket: &str,
        objects: &[DeleteObject],
        bypass_governance_mode: bool,
    ) -> Result<Vec<DeleteError>> {
        check_bucket_name(bucket, false)?;
        let mut errors = Vec::new();
        for batch in objects.chunks(DELETE_BATCH_SIZE) {
            let entries: Vec<(String, Option<String>)> = batch
                .iter()
                .map(|o| (o.name.clone(), o.version_id.clone()))
                .collect();
            let mut request = S3Request::new(Method::POST)
                .bucket(bucket)
                .query("delete", "")
                .body_with_md5(xml::delete_objects(&entries, true)?)?;
            if bypass_governance_mode {
                request = request.header("x-amz-bypass-governance-retention", "true")?;
            }
            let body = self.execute_text(request).await?;
            errors.extend(parse_delete_errors(&body)?);
        }
        Ok(errors)
    }

    /// Server-side copy of `source` to `bucket/object`
    pub async fn copy_object(
        &self,
        bucket: &str,
        object: &str,
        source: &CopySource,
        sse: Option<&Sse>,
        metadata: Option<&BTreeMap<String, String>>,
    ) -> Result<ObjectWriteResult> {
        Self::check_object(bucket, object)?;
        Self::check_object(&source.bucket, &source.object)?;
        self.check_ssec(source.ssec.as_ref())?;
        if let Some(sse) = sse {
            sse.check(self.executor.base_url().is_https())?;
        }

        let mut request = S3Request::new(Method::PUT).bucket(bucket).object(object);
        if let Some(metadata) = metadata {
            request = request
                .headers(metadata_headers(metadata)?)
                .header("x-amz-metadata-directive", "REPLACE")?;
        }
        request = request.headers(source.conditions.headers()?);
        if let Some(key) = &source.ssec {
            request = request.headers(Sse::Customer(key.clone()).copy_headers()?);
        }
        if let Some(sse) = sse {
            request = request.headers(sse.headers()?);
        }

        let mut copy_source = encode_path(&format!("/{}/{}", source.bucket, source.object));
        if let Some(version_id) = &source.version_id {
            copy_source.push_str("?versionId=");
            copy_source.push_str(&encode_query(version_id));
        }
        request = request.header("x-amz-copy-source", &copy_source)?;

        let response = self.execute(request).await?;
        let version_id = response.header("x-amz-version-id").map(str::to_string);
        let result: CopyObjectResult = xml::parse(&response.text().await?, "CopyObjectResult")?;
        Ok(ObjectWriteResult {
            bucket: bucket.to_string(),
            object: object.to_string(),
            etag: result.etag.as_deref().map(trim_etag),
            version_id,
            last_modified: parse_iso8601(result.last_modified.as_deref()),
        })
    }

    pub async fn get_object_tags(
        &self,
        bucket: &str,
        object: &str,
        version_id: Option<&str>,
    ) -> Result<Option<String>> {
        Self::check_object(bucket, object)?;
        let request = S3Request::new(Method::GET)
            .bucket(bucket)
            .object(object)
            .query("tagging", "")
            .version_id(version_id);
        absent_on(self.execute_text(request).await, &["NoSuchTagSet"])
    }

    pub async fn set_object_tags(
        &self,
        bucket: &str,
        object: &str,
        document: &str,
        version_id: Option<&str>,
    ) -> Result<()> {
        Self::check_object(bucket, object)?;
        let request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .object(object)
            .query("tagging", "")
            .version_id(version_id)
            .body_with_md5(document.to_string())?;
        self.execute(request).await?;
        Ok(())
    }

    pub async fn delete_object_tags(&self, bucket: &str, object: &str, version_id: Option<&str>) -> Result<()> {
        Self::check_object(bucket, object)?;
        let request = S3Request::new(Method::DELETE)
            .bucket(bucket)
            .object(object)
            .query("tagging", "")
            .version_id(version_id);
        self.execute(request).await?;
        Ok(())
    }

    async fn set_legal_hold(&self, bucket: &str, object: &str, version_id: Option<&str>, enabled: bool) -> Result<()> {
        Self::check_object(bucket, object)?;
        let request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .object(object)
            .query("legal-hold", "")
            .version_id(version_id)
            .body_with_md5(xml::legal_hold(enabled)?)?;
        self.execute(request).await?;
        Ok(())
    }

    pub async fn enable_object_legal_hold(&self, bucket: &str, object: &str, version_id: Option<&str>) -> Result<()> {
        self.set_legal_hold(bucket, object, version_id, true).await
    }

    pub async fn disable_object_legal_hold(&self, bucket: &str, object: &str, version_id: Option<&str>) -> Result<()> {
        self.set_legal_hold(bucket, object, version_id, false).await
    }

    pub async fn is_object_legal_hold_enabled(
        &self,
        bucket: &str,
        object: &str,
        version_id: Option<&str>,
    ) -> Result<bool> {
        Self::check_object(bucket, object)?;
        let request = S3Request::new(Method::GET)
            .bucket(bucket)
            .object(object)
            .query("legal-hold", "")
            .version_id(version_id);
        match absent_on(self.execute_text(request).await, &["NoSuchObjectLockConfiguration"])? {
            Some(body) => {
                let hold: LegalHold = xml::parse(&body, "LegalHold")?;
                Ok(hold.status == "ON")
            }
            None => Ok(false),
        }
    }

    /// Retention document, or `None` when the object has no lock settings
    pub async fn get_object_retention(
        &self,
        bucket: &str,
        object: &str,
        version_id: Option<&str>,
    ) -> Result<Option<String>> {
        Self::check_object(bucket, object)?;
        let request = S3Request::new(Method::GET)
            .bucket(bucket)
            .object(object)
            .query("retention", "")
            .version_id(version_id);
        absent_on(self.execute_text(request).await, &["NoSuchObjectLockConfiguration"])
    }

    pub async fn set_object_retention(
        &self,
        bucket: &str,
        object: &str,
        document: &str,
        version_id: Option<&str>,
    ) -> Result<()> {
        Self::check_object(bucket, object)?;
        let request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .object(object)
            .query("retention", "")
            .version_id(version_id)
            .body_with_md5(document.to_string())?;
        self.execute(request).await?;
        Ok(())
    }

    // Listings

    /// Lazily paginated listing
    pub fn list_objects(&self, bucket: &str, options: ListObjectsOptions) -> Result<BoxStream<'static, Result<ObjectInfo>>> {
        check_bucket_name(bucket, false)?;
        Ok(list::list_objects(Arc::clone(&self.executor), bucket.to_string(), options))
    }

    pub async fn list_incomplete_uploads(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<IncompleteUpload>> {
        check_bucket_name(bucket, false)?;
        list::list_incomplete_uploads(&self.executor, bucket, prefix, recursive).await
    }

    pub async fn list_parts(&self, bucket: &str, object: &str, upload_id: &str) -> Result<Vec<UploadedPart>> {
        Self::check_object(bucket, object)?;
        list::list_parts(&self.executor, bucket, object, upload_id).await
    }

    /// Abort every incomplete upload of `object`
    pub async fn remove_incomplete_upload(&self, bucket: &str, object: &str) -> Result<()> {
        Self::check_object(bucket, object)?;
        let coordinator = MultipartUploadCoordinator::new(Arc::clone(&self.executor));
        for upload in self.list_incomplete_uploads(bucket, Some(object), true).await? {
            if upload.key == object {
                coordinator.abort(bucket, object, &upload.upload_id).await?;
            }
        }
        Ok(())
    }

    // Presigning

    /// Presigned URL for `method` on `bucket/object`; unsigned when the
    /// client is anonymous.
    pub async fn presigned_url(
        &self,
        method: Method,
        bucket: &str,
        object: &str,
        options: &PresignOptions,
    ) -> Result<Url> {
        Self::check_object(bucket, object)?;
        if options.expires < 1 || options.expires > MAX_PRESIGN_EXPIRY {
            return Err(Error::Config(format!(
                "expires must be between 1 second to {MAX_PRESIGN_EXPIRY} seconds"
            )));
        }

        let region = self.executor.get_region(Some(bucket), None).await?;
        let mut query = options.extra_query.clone();
        if let Some(version_id) = &options.version_id {
            query.push(("versionId".to_string(), version_id.clone()));
        }
        query.extend(options.response_headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        let url = self
            .executor
            .base_url()
            .build(&method, &region, Some(bucket), Some(object), &query)?;
        match self.executor.credentials().await? {
            Some(credentials) => self.executor.signer().presign(
                &method,
                &url,
                &region,
                &credentials,
                options.request_date.unwrap_or_else(Timestamp::now),
                options.expires,
            ),
            None => Ok(url),
        }
    }

    pub async fn presigned_get_object(&self, bucket: &str, object: &str, options: &PresignOptions) -> Result<Url> {
        self.presigned_url(Method::GET, bucket, object, options).await
    }

    pub async fn presigned_put_object(&self, bucket: &str, object: &str, expires: u64) -> Result<Url> {
        let options = PresignOptions {
            expires,
            ..Default::default()
        };
        self.presigned_url(Method::PUT, bucket, object, &options).await
    }

    /// Form fields for a browser POST upload under `policy`
    pub async fn presigned_post_policy(&self, policy: &PostPolicy) -> Result<PresignedPost> {
        let credentials = self.executor.credentials().await?.ok_or_else(|| {
            Error::Config("anonymous access does not require presigned post form-data".into())
        })?;
        let bucket = policy.bucket();
        let region = self.executor.get_region(Some(bucket), None).await?;
        let now = Timestamp::now();
        let credential = credential_string(&credentials.access_key, now, &region);
        let date = amz_date(now);

        let mut conditions = vec![
            ("x-amz-date", date.as_str()),
            ("x-amz-algorithm", SIGN_V4_ALGORITHM),
            ("x-amz-credential", credential.as_str()),
        ];
        if let Some(token) = &credentials.session_token {
            conditions.push(("x-amz-security-token", token.as_str()));
        }
        let encoded = policy.encode(&conditions)?;
        let signature = self
            .executor
            .signer()
            .sign_post_policy(&encoded, &credentials, now, &region)?;

        let mut form_data = policy.form_data().clone();
        form_data.insert("policy".to_string(), encoded);
        form_data.insert("x-amz-algorithm".to_string(), SIGN_V4_ALGORITHM.to_string());
        form_data.insert("x-amz-credential".to_string(), credential);
        form_data.insert("x-amz-date".to_string(), date);
        form_data.insert("x-amz-signature".to_string(), signature);
        if let Some(token) = &credentials.session_token {
            form_data.insert("x-amz-security-token".to_string(), token.clone());
        }

        let url = self
            .executor
            .base_url()
            .build(&Method::POST, &region, Some(bucket), None, &[])?;
        Ok(PresignedPost { url, form_data })
    }
}

/// Per-key errors of a multi-object delete response.
///
/// A bare `<Error>` document means the whole batch failed.
fn parse_delete_errors(body: &str) -> Result<Vec<DeleteError>> {
    if xml::root_element(body).as_deref() == Some("Error") {
        let err: xml::DeleteErrorEntry = xml::parse(body, "Error")?;
        return Ok(vec![DeleteError {
            code: err.code,
            message: err.message,
            name: err.key,
            version_id: err.version_id,
        }]);
    }
    let result: DeleteResult = xml::parse(body, "DeleteResult")?;
    Ok(result
        .error
        .into_iter()
        .map(|e| DeleteError {
            code: e.code,
            message: e.message,
            name: e.key,
            version_id: e.version_id,
        })
        .collect())
}
