//! Multipart upload coordinator
//!
//! Splits a byte source into parts, uploads them sequentially or through a
//! [`WorkerPool`], and completes the upload. Any failure after the upload id
//! exists aborts the upload before the original error is returned.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use http::{HeaderMap, Method};
use osc_core::{ByteSource, Error, HttpResponse, Result};

use crate::endpoint::check_bucket_name;
use crate::executor::{RequestExecutor, S3Request};
use crate::multipart::{Part, PendingUpload, part_info};
use crate::pool::WorkerPool;
use crate::types::{ObjectWriteResult, PutObjectOptions, trim_etag};
use crate::xml::{self, CompleteMultipartUploadResult, InitiateMultipartUploadResult};

fn header_string(response: &HttpResponse, name: &str) -> Option<String> {
    response.header(name).map(str::to_string)
}

fn write_result(bucket: &str, object: &str, response: &HttpResponse) -> ObjectWriteResult {
    ObjectWriteResult {
        bucket: bucket.to_string(),
        object: object.to_string(),
        etag: response.header("etag").map(trim_etag),
        version_id: header_string(response, "x-amz-version-id"),
        last_modified: None,
    }
}

fn short_read(expected: u64, got: usize) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("stream having not enough data; expected: {expected}, got: {got} bytes"),
    ))
}

/// Upload one part and return its ETag
async fn upload_part(
    executor: Arc<RequestExecutor>,
    bucket: String,
    object: String,
    upload_id: String,
    part_number: u64,
    data: Bytes,
    headers: HeaderMap,
) -> Result<Part> {
    let request = S3Request::new(Method::PUT)
        .bucket(&bucket)
        .object(&object)
        .query("partNumber", part_number.to_string())
        .query("uploadId", upload_id)
        .headers(headers)
        .body(data);
    let response = executor.execute(request).await?;
    let etag = match response.header("etag").map(trim_etag) {
        Some(etag) if !etag.is_empty() => etag,
        _ => {
            return Err(Error::InvalidResponse {
                status: response.status.as_u16(),
                content_type: header_string(&response, "content-type"),
                body: Some(format!("part {part_number} response has no ETag")),
            });
        }
    };
    tracing::debug!(bucket = %bucket, object = %object, part_number, etag = %etag, "uploaded part");
    Ok(Part::new(part_number, etag))
}

/// Drives put_object for one object
pub struct MultipartUploadCoordinator {
    executor: Arc<RequestExecutor>,
}

impl MultipartUploadCoordinator {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Upload `source` as `bucket/object`.
    ///
    /// `length` is the exact number of bytes `source` will yield, or `None`
    /// to discover it while reading.
    pub async fn upload<S: ByteSource>(
        &self,
        bucket: &str,
        object: &str,
        mut source: S,
        length: Option<u64>,
        options: &PutObjectOptions,
    ) -> Result<ObjectWriteResult> {
        check_bucket_name(bucket, false)?;
        if object.is_empty() {
            return Err(Error::Config("object name cannot be empty".into()));
        }
        if let Some(sse) = &options.sse {
            sse.check(self.executor.base_url().is_https())?;
        }
        let (part_size, part_count) = part_info(length, options.part_size)?;
        if let Some(progress) = &options.progress {
            progress.set_meta(object, length);
        }

        let mut upload: Option<PendingUpload> = None;
        let result = self
            .run(bucket, object, &mut source, length, part_size, part_count, options, &mut upload)
            .await;

        match result {
            Ok(written) => Ok(written),
            Err(err) => {
                if let Some(upload) = upload {
                    tracing::info!(bucket, object, upload_id = %upload.upload_id, error = %err, "aborting multipart upload");
                    if let Err(abort_err) = self.abort(bucket, object, &upload.upload_id).await {
                        tracing::warn!(
                            bucket,
                            object,
                            upload_id = %upload.upload_id,
                            error = %abort_err,
                            "failed to abort multipart upload"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run<S: ByteSource>(
        &self,
        bucket: &str,
        object: &str,
        source: &mut S,
        length: Option<u64>,
        part_size: u64,
        mut part_count: Option<u64>,
        options: &PutObjectOptions,
        upload: &mut Option<PendingUpload>,
    ) -> Result<ObjectWriteResult> {
        let headers = options.headers()?;
        let part_headers = match &options.sse {
            Some(sse) => sse.part_headers()?,
            None => HeaderMap::new(),
        };
        let mut pool: Option<WorkerPool<Part>> = None;

        let mut carry = Bytes::new();
        let mut uploaded: u64 = 0;
        let mut part_number: u64 = 0;

        loop {
            part_number += 1;

            let data = match part_count {
                Some(count) => {
                    let size = if part_number == count {
                        length.unwrap_or(0) - uploaded
                    } else {
                        part_size
                    };
                    let data = source.read(size as usize).await?;
                    if (data.len() as u64) != size {
                        return Err(short_read(size, data.len()));
                    }
                    data
                }
                None => {
                    // Read one byte past the part boundary to learn whether
                    // this is the last part.
                    let want = (part_size + 1) as usize - carry.len();
                    let chunk = source.read(want).await?;
                    let mut buf = BytesMut::with_capacity(carry.len() + chunk.len());
                    buf.extend_from_slice(&carry);
                    buf.extend_from_slice(&chunk);
                    if (buf.len() as u64) <= part_size {
                        part_count = Some(part_number);
                        buf.freeze()
                    } else {
                        carry = buf.split_off(part_size as usize).freeze();
                        buf.freeze()
                    }
                }
            };

            uploaded += data.len() as u64;
            if let Some(progress) = &options.progress {
                progress.update(data.len() as u64);
            }

            if part_number == 1 && part_count == Some(1) {
                return self.put_single(bucket, object, data, headers).await;
            }

            let upload_id = match upload.as_ref().map(|pending| pending.upload_id.clone()) {
                Some(upload_id) => upload_id,
                None => {
                    let upload_id = self.create(bucket, object, &headers).await?;
                    tracing::info!(bucket, object, upload_id = %upload_id, part_size, "started multipart upload");
                    *upload = Some(PendingUpload::new(upload_id.clone(), bucket, object, part_size));
                    if options.parallel_uploads > 1 {
                        pool = Some(WorkerPool::new(options.parallel_uploads));
                    }
                    upload_id
                }
            };

            let task = upload_part(
                Arc::clone(&self.executor),
                bucket.to_string(),
                object.to_string(),
                upload_id,
                part_number,
                data,
                part_headers.clone(),
            );
            match &mut pool {
                Some(pool) => pool.submit(part_number as usize, task.boxed()).await?,
                None => {
                    let part = task.await?;
                    if let Some(pending) = upload.as_mut() {
                        pending.record(part);
                    }
                }
            }

            if part_count == Some(part_number) {
                break;
            }
        }

        let Some(pending) = upload.as_mut() else {
            return Err(Error::General("multipart upload was never started".into()));
        };
        pending.part_count = part_count;
        if let Some(pool) = pool {
            for (_, part) in pool.join().await? {
                pending.record(part);
            }
        }

        self.complete(pending).await
    }

    async fn put_single(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
        headers: HeaderMap,
    ) -> Result<ObjectWriteResult> {
        let request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .object(object)
            .headers(headers)
            .body(data);
        let response = self.executor.execute(request).await?;
        Ok(write_result(bucket, object, &response))
    }

    async fn create(&self, bucket: &str, object: &str, headers: &HeaderMap) -> Result<String> {
        let request = S3Request::new(Method::POST)
            .bucket(bucket)
            .object(object)
            .query("uploads", "")
            .headers(headers.clone());
        let response = self.executor.execute(request).await?;
        let result: InitiateMultipartUploadResult =
            xml::parse(&response.text().await?, "InitiateMultipartUploadResult")?;
        if result.upload_id.is_empty() {
            return Err(Error::Xml("InitiateMultipartUploadResult has no UploadId".into()));
        }
        Ok(result.upload_id)
    }

    async fn complete(&self, upload: &mut PendingUpload) -> Result<ObjectWriteResult> {
        let body = upload.completion_body()?;
        let request = S3Request::new(Method::POST)
            .bucket(&upload.bucket)
            .object(&upload.object)
            .query("uploadId", upload.upload_id.clone())
            .header("content-type", "application/xml")?
            .body_with_md5(body)?;
        let response = self.executor.execute(request).await?;
        let version_id = header_string(&response, "x-amz-version-id");
        let result: CompleteMultipartUploadResult =
            xml::parse(&response.text().await?, "CompleteMultipartUploadResult")?;
        tracing::info!(
            bucket = %upload.bucket,
            object = %upload.object,
            upload_id = %upload.upload_id,
            parts = upload.parts.len(),
            "completed multipart upload"
        );
        Ok(ObjectWriteResult {
            bucket: upload.bucket.clone(),
            object: upload.object.clone(),
            etag: result.etag.as_deref().map(trim_etag),
            version_id,
            last_modified: None,
        })
    }

    /// Abort an upload, discarding any uploaded parts
    pub async fn abort(&self, bucket: &str, object: &str, upload_id: &str) -> Result<()> {
        let request = S3Request::new(Method::DELETE)
            .bucket(bucket)
            .object(object)
            .query("uploadId", upload_id);
        self.executor.execute(request).await?;
        Ok(())
    }
}
