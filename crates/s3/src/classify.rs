//! Failed-response classification
//!
//! Turns a non-success HTTP response into an [`Error`]: the XML error
//! document when the server sent one, otherwise an error synthesized from
//! the status code and the identifiers the request named.

use http::{HeaderMap, Method, StatusCode};
use osc_core::{Error, S3Error};
use serde::Deserialize;

/// Internal code asking the caller to retry a HEAD against the region the
/// server named. Never returned from a public operation.
pub const RETRY_HEAD: &str = "RetryHead";

/// Statuses that carry a successful response
pub fn is_success(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 204 | 206)
}

/// What the failed request targeted
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub method: &'a Method,
    pub bucket: Option<&'a str>,
    pub object: Option<&'a str>,
    /// URL path of the request, reported as the error resource
    pub resource: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ErrorDocument {
    code: Option<String>,
    message: Option<String>,
    resource: Option<String>,
    request_id: Option<String>,
    host_id: Option<String>,
    bucket_name: Option<String>,
    key: Option<String>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn is_xml_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.split(';')
                .any(|part| part.trim().eq_ignore_ascii_case("application/xml"))
        })
}

/// Code and message for a redirect-family status (301, 307, 400).
///
/// With `allow_retry`, a HEAD to a bucket whose region is cached and for
/// which the server sent a region hint becomes [`RETRY_HEAD`].
pub fn redirect_code(
    status: u16,
    region_hint: Option<&str>,
    method: &Method,
    bucket: Option<&str>,
    bucket_cached: bool,
    allow_retry: bool,
) -> Option<(String, String)> {
    if allow_retry && region_hint.is_some() && *method == Method::HEAD && bucket.is_some() && bucket_cached {
        return Some((RETRY_HEAD.to_string(), String::new()));
    }

    let (code, message) = match status {
        301 => ("PermanentRedirect", "Moved Permanently"),
        307 => ("Redirect", "Temporary redirect"),
        400 => ("BadRequest", "Bad request"),
        _ => return None,
    };
    let message = match region_hint {
        Some(region) => format!("{message}; use region {region}"),
        None => message.to_string(),
    };
    Some((code.to_string(), message))
}

fn status_code(
    status: u16,
    ctx: &RequestContext<'_>,
    region_hint: Option<&str>,
    bucket_cached: bool,
) -> Option<(String, String)> {
    let fixed = |code: &str, message: &str| Some((code.to_string(), message.to_string()));
    match status {
        301 | 307 | 400 => redirect_code(
            status,
            region_hint,
            ctx.method,
            ctx.bucket,
            bucket_cached,
            true,
        ),
        403 => fixed("AccessDenied", "Access denied"),
        404 if ctx.object.is_some() => fixed("NoSuchKey", "Object does not exist"),
        404 if ctx.bucket.is_some() => fixed("NoSuchBucket", "Bucket does not exist"),
        404 => fixed("ResourceNotFound", "Request resource not found"),
        405 | 501 => fixed(
            "MethodNotAllowed",
            "The specified method is not allowed against this resource",
        ),
        409 if ctx.bucket.is_some() => fixed("NoSuchBucket", "Bucket does not exist"),
        409 => fixed("ResourceConflict", "Request resource conflicts"),
        _ => None,
    }
}

/// Classify a failed response whose body has been drained into `body`.
///
/// `bucket_cached` tells whether the target bucket currently has a cached
/// region, which decides between a redirect error and [`RETRY_HEAD`].
pub fn classify(
    ctx: &RequestContext<'_>,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
    bucket_cached: bool,
) -> Error {
    let status_u16 = status.as_u16();
    let is_head = *ctx.method == Method::HEAD;
    let content_type = header(headers, "content-type");

    if !is_head && (!is_xml_content_type(headers) || body.is_empty()) {
        return Error::InvalidResponse {
            status: status_u16,
            content_type,
            body: (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned()),
        };
    }

    let region_hint = header(headers, "x-amz-bucket-region");
    let request_id = header(headers, "x-amz-request-id").unwrap_or_default();
    let host_id = header(headers, "x-amz-id-2").unwrap_or_default();

    if !body.is_empty() {
        let text = String::from_utf8_lossy(body);
        return match quick_xml::de::from_str::<ErrorDocument>(&text) {
            Ok(doc) => Error::S3(S3Error {
                code: doc.code.unwrap_or_default(),
                message: doc.message.unwrap_or_default(),
                resource: doc.resource.unwrap_or_else(|| ctx.resource.to_string()),
                request_id: doc.request_id.unwrap_or(request_id),
                host_id: doc.host_id.unwrap_or(host_id),
                bucket_name: doc.bucket_name.or_else(|| ctx.bucket.map(str::to_string)),
                object_name: doc.key.or_else(|| ctx.object.map(str::to_string)),
                status: status_u16,
                region_hint,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "error document is not valid XML");
                Error::InvalidResponse {
                    status: status_u16,
                    content_type,
                    body: Some(text.into_owned()),
                }
            }
        };
    }

    match status_code(status_u16, ctx, region_hint.as_deref(), bucket_cached) {
        Some((code, message)) => Error::S3(S3Error {
            code,
            message,
            resource: ctx.resource.to_string(),
            request_id,
            host_id,
            bucket_name: ctx.bucket.map(str::to_string),
            object_name: ctx.object.map(str::to_string),
            status: status_u16,
            region_hint,
        }),
        None => Error::Server { status: status_u16 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn ctx<'a>(method: &'a Method, bucket: Option<&'a str>, object: Option<&'a str>) -> RequestContext<'a> {
        RequestContext {
            method,
            bucket,
            object,
            resource: "/photos",
        }
    }

    fn xml_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/xml"));
        headers
    }

    fn code_of(err: &Error) -> &str {
        err.code().unwrap_or("<not an S3 error>")
    }

    #[test]
    fn test_success_statuses() {
        assert!(is_success(StatusCode::OK));
        assert!(is_success(StatusCode::NO_CONTENT));
        assert!(is_success(StatusCode::PARTIAL_CONTENT));
        assert!(!is_success(StatusCode::CREATED));
        assert!(!is_success(StatusCode::NOT_MODIFIED));
    }

    #[test]
    fn test_xml_error_document_parsed() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message>
<Key>cat.jpg</Key><BucketName>photos</BucketName><Resource>/photos/cat.jpg</Resource>
<RequestId>17A1</RequestId><HostId>dd9025</HostId></Error>"#;
        let method = Method::GET;
        let err = classify(
            &ctx(&method, Some("photos"), Some("cat.jpg")),
            StatusCode::NOT_FOUND,
            &xml_headers(),
            body,
            false,
        );
        let Error::S3(e) = err else {
            panic!("expected S3 error, got {err:?}");
        };
        assert_eq!(e.code, "NoSuchKey");
        assert_eq!(e.resource, "/photos/cat.jpg");
        assert_eq!(e.request_id, "17A1");
        assert_eq!(e.host_id, "dd9025");
        assert_eq!(e.object_name.as_deref(), Some("cat.jpg"));
        assert_eq!(e.status, 404);
    }

    #[test]
    fn test_html_body_is_invalid_response() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/html"));
        let method = Method::GET;
        let err = classify(
            &ctx(&method, Some("photos"), None),
            StatusCode::BAD_GATEWAY,
            &headers,
            b"<html>proxy error</html>",
            false,
        );
        match err {
            Error::InvalidResponse {
                status,
                content_type,
                body,
            } => {
                assert_eq!(status, 502);
                assert_eq!(content_type.as_deref(), Some("text/html"));
                assert_eq!(body.as_deref(), Some("<html>proxy error</html>"));
            }
            other => panic!("expected InvalidResponse, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_body_on_get_is_invalid_response() {
        let method = Method::GET;
        let err = classify(
            &ctx(&method, Some("photos"), None),
            StatusCode::NOT_FOUND,
            &xml_headers(),
            b"",
            false,
        );
        assert!(matches!(err, Error::InvalidResponse { body: None, .. }));
    }

    #[test]
    fn test_head_404_depends_on_identifiers() {
        let method = Method::HEAD;
        let headers = HeaderMap::new();

        let err = classify(&ctx(&method, Some("photos"), None), StatusCode::NOT_FOUND, &headers, b"", false);
        assert_eq!(code_of(&err), "NoSuchBucket");

        let err = classify(
            &ctx(&method, Some("photos"), Some("cat.jpg")),
            StatusCode::NOT_FOUND,
            &headers,
            b"",
            false,
        );
        assert_eq!(code_of(&err), "NoSuchKey");

        let err = classify(&ctx(&method, None, None), StatusCode::NOT_FOUND, &headers, b"", false);
        assert_eq!(code_of(&err), "ResourceNotFound");
    }

    #[test]
    fn test_head_status_table() {
        let method = Method::HEAD;
        let headers = HeaderMap::new();
        let c = ctx(&method, Some("photos"), None);

        assert_eq!(code_of(&classify(&c, StatusCode::FORBIDDEN, &headers, b"", false)), "AccessDenied");
        assert_eq!(
            code_of(&classify(&c, StatusCode::METHOD_NOT_ALLOWED, &headers, b"", false)),
            "MethodNotAllowed"
        );
        assert_eq!(
            code_of(&classify(&c, StatusCode::NOT_IMPLEMENTED, &headers, b"", false)),
            "MethodNotAllowed"
        );
        assert_eq!(code_of(&classify(&c, StatusCode::CONFLICT, &headers, b"", false)), "NoSuchBucket");

        let no_bucket = ctx(&method, None, None);
        assert_eq!(
            code_of(&classify(&no_bucket, StatusCode::CONFLICT, &headers, b"", false)),
            "ResourceConflict"
        );

        let err = classify(&c, StatusCode::IM_A_TEAPOT, &headers, b"", false);
        assert!(matches!(err, Error::Server { status: 418 }));
    }

    #[test]
    fn test_redirect_with_region_hint() {
        let method = Method::HEAD;
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-bucket-region", HeaderValue::from_static("us-west-2"));
        let c = ctx(&method, Some("photos"), None);

        // Not cached: surfaced as a redirect error naming the region
        let err = classify(&c, StatusCode::MOVED_PERMANENTLY, &headers, b"", false);
        let Error::S3(e) = err else {
            panic!("expected S3 error");
        };
        assert_eq!(e.code, "PermanentRedirect");
        assert_eq!(e.message, "Moved Permanently; use region us-west-2");
        assert_eq!(e.region_hint.as_deref(), Some("us-west-2"));

        // Cached: retry sentinel
        let err = classify(&c, StatusCode::MOVED_PERMANENTLY, &headers, b"", true);
        assert_eq!(code_of(&err), RETRY_HEAD);

        let err = classify(&c, StatusCode::TEMPORARY_REDIRECT, &HeaderMap::new(), b"", true);
        let Error::S3(e) = err else {
            panic!("expected S3 error");
        };
        assert_eq!(e.code, "Redirect");
        assert_eq!(e.message, "Temporary redirect");
    }

    #[test]
    fn test_redirect_code_without_retry() {
        let method = Method::HEAD;
        let (code, message) =
            redirect_code(400, Some("eu-west-1"), &method, Some("photos"), true, false).unwrap();
        assert_eq!(code, "BadRequest");
        assert_eq!(message, "Bad request; use region eu-west-1");
        assert!(redirect_code(500, None, &method, Some("photos"), true, false).is_none());
    }
}
