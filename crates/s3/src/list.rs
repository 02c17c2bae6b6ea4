//! Listings
//!
//! Object listings are lazily paginated streams: a page is only requested
//! when the consumer has drained the previous one, and dropping the stream
//! stops the walk.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::Method;
use osc_core::{Error, Result};
use percent_encoding::percent_decode_str;

use crate::endpoint::Query;
use crate::executor::{RequestExecutor, S3Request};
use crate::types::{IncompleteUpload, ListObjectsOptions, ObjectInfo, UploadedPart, parse_iso8601, trim_etag};
use crate::xml::{self, ListBucketResult, ListMultipartUploadsResult, ListPartsResult, ListVersionsResult};

const MAX_KEYS: &str = "1000";

/// Where the next page starts
#[derive(Debug, Clone, Default)]
struct Cursor {
    start_after: Option<String>,
    continuation_token: Option<String>,
    version_id_marker: Option<String>,
}

fn list_query(options: &ListObjectsOptions, cursor: &Cursor) -> Query {
    let mut query = Query::new();
    let mut push = |k: &str, v: &str| query.push((k.to_string(), v.to_string()));

    let v2 = !options.include_version && !options.use_api_v1;
    if options.include_version {
        push("versions", "");
    } else if !options.use_api_v1 {
        push("list-type", "2");
    }
    if v2 {
        if let Some(token) = &cursor.continuation_token {
            push("continuation-token", token);
        }
        push("fetch-owner", "true");
        if options.include_user_meta {
            push("user-metadata", "true");
        }
    }

    push("delimiter", if options.recursive { "" } else { "/" });
    push("max-keys", MAX_KEYS);
    push("prefix", options.prefix.as_deref().unwrap_or(""));

    if let Some(start_after) = &cursor.start_after {
        let key = if options.include_version {
            "key-marker"
        } else if options.use_api_v1 {
            "marker"
        } else {
            "start-after"
        };
        push(key, start_after);
    }
    if let Some(marker) = &cursor.version_id_marker {
        push("version-id-marker", marker);
    }
    query
}

fn decode_key(key: String, encoding_type: Option<&str>) -> String {
    if encoding_type == Some("url") {
        percent_decode_str(&key).decode_utf8_lossy().into_owned()
    } else {
        key
    }
}

fn prefix_entry(bucket: &str, prefix: String) -> ObjectInfo {
    ObjectInfo {
        bucket: bucket.to_string(),
        key: prefix,
        is_dir: true,
        ..Default::default()
    }
}

/// Parse one page; returns the entries and the cursor of the next page
fn parse_page(
    bucket: &str,
    options: &ListObjectsOptions,
    body: &str,
) -> Result<(Vec<ObjectInfo>, Option<Cursor>)> {
    if options.include_version {
        let page: ListVersionsResult = xml::parse(body, "ListVersionsResult")?;
        let encoding = page.encoding_type.as_deref();
        let mut entries = Vec::with_capacity(page.version.len() + page.delete_marker.len());
        for (is_delete_marker, version) in page
            .version
            .into_iter()
            .map(|v| (false, v))
            .chain(page.delete_marker.into_iter().map(|v| (true, v)))
        {
            entries.push(ObjectInfo {
                bucket: bucket.to_string(),
                key: decode_key(version.key, encoding),
                last_modified: parse_iso8601(version.last_modified.as_deref()),
                etag: version.etag.as_deref().map(trim_etag),
                size: version.size,
                storage_class: version.storage_class,
                owner_id: version.owner.as_ref().and_then(|o| o.id.clone()),
                owner_name: version.owner.and_then(|o| o.display_name),
                version_id: version.version_id,
                is_latest: version.is_latest,
                is_delete_marker,
                ..Default::default()
            });
        }
        for prefix in page.common_prefixes {
            entries.push(prefix_entry(bucket, decode_key(prefix.prefix, encoding)));
        }
        let next = page.is_truncated.then(|| Cursor {
            start_after: page.next_key_marker,
            version_id_marker: page.next_version_id_marker,
            ..Default::default()
        });
        return Ok((entries, next));
    }

    let page: ListBucketResult = xml::parse(body, "ListBucketResult")?;
    let encoding = page.encoding_type.as_deref();
    let mut entries = Vec::with_capacity(page.contents.len() + page.common_prefixes.len());
    for entry in page.contents {
        entries.push(ObjectInfo {
            bucket: bucket.to_string(),
            key: decode_key(entry.key, encoding),
            last_modified: parse_iso8601(entry.last_modified.as_deref()),
            etag: entry.etag.as_deref().map(trim_etag),
            size: entry.size,
            storage_class: entry.storage_class,
            owner_id: entry.owner.as_ref().and_then(|o| o.id.clone()),
            owner_name: entry.owner.and_then(|o| o.display_name),
            is_latest: true,
            metadata: entry.user_metadata.unwrap_or_default(),
            ..Default::default()
        });
    }
    for prefix in page.common_prefixes {
        entries.push(prefix_entry(bucket, decode_key(prefix.prefix, encoding)));
    }

    let next = if !page.is_truncated {
        None
    } else if options.use_api_v1 {
        // NextMarker is only sent when a delimiter is used
        let marker = page
            .next_marker
            .or_else(|| entries.iter().rev().find(|e| !e.is_dir).map(|e| e.key.clone()))
            .or_else(|| entries.last().map(|e| e.key.clone()));
        marker.map(|m| Cursor {
            start_after: Some(m),
            ..Default::default()
        })
    } else {
        page.next_continuation_token.map(|token| Cursor {
            continuation_token: Some(token),
            ..Default::default()
        })
    };
    Ok((entries, next))
}

/// Stream every entry under `options.prefix`
pub fn list_objects(
    executor: Arc<RequestExecutor>,
    bucket: String,
    options: ListObjectsOptions,
) -> BoxStream<'static, Result<ObjectInfo>> {
    let first = Cursor {
        start_after: options.start_after.clone(),
        ..Default::default()
    };
    let options = Arc::new(options);

    stream::try_unfold(Some(first), move |cursor| {
        let executor = Arc::clone(&executor);
        let bucket = bucket.clone();
        let options = Arc::clone(&options);
        async move {
            let Some(cursor) = cursor else {
                return Ok::<_, Error>(None);
            };
            let mut request = S3Request::new(Method::GET).bucket(&bucket);
            request.query = list_query(&options, &cursor);
            let body = executor.execute(request).await?.text().await?;
            let (entries, next) = parse_page(&bucket, &options, &body)?;
            tracing::debug!(bucket = %bucket, entries = entries.len(), more = next.is_some(), "listed page");
            Ok(Some((entries, next)))
        }
    })
    .map_ok(|entries| stream::iter(entries.into_iter().map(Ok::<_, Error>)))
    .try_flatten()
    .boxed()
}

/// First page of incomplete multipart uploads under `prefix`
pub async fn list_incomplete_uploads(
    executor: &RequestExecutor,
    bucket: &str,
    prefix: Option<&str>,
    recursive: bool,
) -> Result<Vec<IncompleteUpload>> {
    let request = S3Request::new(Method::GET)
        .bucket(bucket)
        .query("uploads", "")
        .query("delimiter", if recursive { "" } else { "/" })
        .query("max-uploads", MAX_KEYS)
        .query("prefix", prefix.unwrap_or(""))
        .query("encoding-type", "url");
    let body = executor.execute(request).await?.text().await?;
    let page: ListMultipartUploadsResult = xml::parse(&body, "ListMultipartUploadsResult")?;
    let encoding = page.encoding_type.as_deref();
    Ok(page
        .upload
        .into_iter()
        .map(|upload| IncompleteUpload {
            bucket: bucket.to_string(),
            key: decode_key(upload.key, encoding),
            upload_id: upload.upload_id,
            initiated: parse_iso8601(upload.initiated.as_deref()),
        })
        .collect())
}

/// First page of parts uploaded so far for `upload_id`
pub async fn list_parts(
    executor: &RequestExecutor,
    bucket: &str,
    object: &str,
    upload_id: &str,
) -> Result<Vec<UploadedPart>> {
    let request = S3Request::new(Method::GET)
        .bucket(bucket)
        .object(object)
        .query("uploadId", upload_id)
        .query("max-parts", MAX_KEYS);
    let body = executor.execute(request).await?.text().await?;
    let page: ListPartsResult = xml::parse(&body, "ListPartsResult")?;
    Ok(page
        .part
        .into_iter()
        .map(|part| UploadedPart {
            part_number: part.part_number,
            etag: trim_etag(&part.etag),
            size: part.size,
            last_modified: parse_iso8601(part.last_modified.as_deref()),
        })
        .collect())
}
