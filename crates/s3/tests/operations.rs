//! Listing, presigning, file transfer, notification and batch delete scenarios

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use common::{FakeTransport, regional_client, response, with_header, xml};
use futures::{StreamExt, TryStreamExt};
use http::Method;
use osc_core::{Credentials, Error, HttpRequest, HttpResponse, ResponseBody};
use osc_s3::{DeleteObject, GetObjectOptions, ListObjectsOptions, PresignOptions, S3Client};

fn body_text(request: &HttpRequest) -> String {
    String::from_utf8(request.body.clone().unwrap_or_default().to_vec()).unwrap()
}

fn with_body(mut response: HttpResponse, body: &[u8]) -> HttpResponse {
    response.body = ResponseBody::Full(Bytes::copy_from_slice(body));
    response
}

#[tokio::test]
async fn test_list_objects_follows_continuation_token() {
    let transport = FakeTransport::new(|req| match req.query("continuation-token").as_deref() {
        None => xml(
            200,
            "<ListBucketResult><Name>photos</Name><IsTruncated>true</IsTruncated>\
             <NextContinuationToken>page-2</NextContinuationToken>\
             <Contents><Key>a.jpg</Key><Size>3</Size><ETag>\"e1\"</ETag></Contents>\
             <Contents><Key>b.jpg</Key><Size>4</Size></Contents></ListBucketResult>",
        ),
        Some("page-2") => xml(
            200,
            "<ListBucketResult><Name>photos</Name><IsTruncated>false</IsTruncated>\
             <Contents><Key>c.jpg</Key><Size>5</Size></Contents></ListBucketResult>",
        ),
        Some(_) => response(400),
    });
    let client = regional_client(transport.clone());

    let options = ListObjectsOptions {
        recursive: true,
        ..Default::default()
    };
    let objects: Vec<_> = client
        .list_objects("photos", options)
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["a.jpg", "b.jpg", "c.jpg"]);
    assert_eq!(objects[0].etag.as_deref(), Some("e1"));

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].query("list-type").as_deref(), Some("2"));
    assert_eq!(requests[0].query("delimiter").as_deref(), Some(""));
    assert_eq!(requests[0].query("max-keys").as_deref(), Some("1000"));
}

#[tokio::test]
async fn test_list_objects_propagates_errors() {
    let transport = FakeTransport::new(|_| common::error_xml(404, "NoSuchBucket"));
    let client = regional_client(transport);

    let err = client
        .list_objects("photos", ListObjectsOptions::default())
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("NoSuchBucket"));
}

#[tokio::test]
async fn test_presign_rejects_out_of_range_expiry() {
    let transport = FakeTransport::new(|_| response(200));
    let client = regional_client(transport.clone());

    for expires in [0, 604_801] {
        let options = PresignOptions {
            expires,
            ..Default::default()
        };
        let err = client.presigned_get_object("photos", "a", &options).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)), "expires {expires}: {err:?}");
    }
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_presign_signed_url() {
    let transport = FakeTransport::new(|_| response(200));
    let client = regional_client(transport.clone());

    let options = PresignOptions {
        expires: 3600,
        request_date: Some("2024-05-01T12:00:00Z".parse().unwrap()),
        ..Default::default()
    };
    let url = client.presigned_get_object("photos", "a", &options).await.unwrap();

    assert_eq!(url.path(), "/photos/a");
    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };
    assert_eq!(query("X-Amz-Expires").as_deref(), Some("3600"));
    assert_eq!(query("X-Amz-Date").as_deref(), Some("20240501T120000Z"));
    assert_eq!(
        query("X-Amz-Credential").as_deref(),
        Some("minioadmin/20240501/us-east-1/s3/aws4_request")
    );
    assert!(query("X-Amz-Signature").is_some_and(|s| s.len() == 64));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_presign_anonymous_is_unsigned() {
    let transport = FakeTransport::new(|_| response(200));
    let client = S3Client::builder("http://localhost:9000")
        .transport(transport.clone())
        .build()
        .unwrap();

    let url = client
        .presigned_get_object("photos", "a", &PresignOptions::default())
        .await
        .unwrap();
    assert_eq!(url.as_str(), "http://localhost:9000/photos/a");
    assert!(transport.requests().is_empty());
}

const CONTENT: &[u8] = b"0123456789";

/// Serves `CONTENT` with etag `abc`, honoring open-ended ranges
fn object_server(req: &HttpRequest) -> HttpResponse {
    if req.method == Method::HEAD {
        let head = with_header(response(200), "content-length", &CONTENT.len().to_string());
        return with_header(head, "etag", "\"abc\"");
    }
    match req.header("range").and_then(|r| r.strip_prefix("bytes=")) {
        Some(range) => {
            let start: usize = range.trim_end_matches('-').parse().unwrap();
            with_body(response(206), &CONTENT[start..])
        }
        None => with_body(response(200), CONTENT),
    }
}

fn gets(transport: &FakeTransport) -> Vec<HttpRequest> {
    transport
        .requests()
        .into_iter()
        .filter(|r| r.method == Method::GET)
        .collect()
}

#[tokio::test]
async fn test_fget_object_resumes_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("digits.txt");
    let partial = dir.path().join("digits.txt.abc.part.osc");
    std::fs::write(&partial, &CONTENT[..4]).unwrap();

    let transport = FakeTransport::new(object_server);
    let client = regional_client(transport.clone());
    let stat = client
        .fget_object("photos", "digits.txt", &target, &GetObjectOptions::default())
        .await
        .unwrap();

    assert_eq!(stat.size, 10);
    assert_eq!(std::fs::read(&target).unwrap(), CONTENT);
    assert!(!partial.exists());
    let gets = gets(&transport);
    assert_eq!(gets.len(), 1);
    assert_eq!(gets[0].header("range"), Some("bytes=4-"));
}

#[tokio::test]
async fn test_fget_object_skips_download_when_partial_is_complete() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("digits.txt");
    std::fs::write(dir.path().join("digits.txt.abc.part.osc"), CONTENT).unwrap();
    std::fs::write(&target, b"stale").unwrap();

    let transport = FakeTransport::new(object_server);
    let client = regional_client(transport.clone());
    client
        .fget_object("photos", "digits.txt", &target, &GetObjectOptions::default())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), CONTENT);
    assert!(gets(&transport).is_empty());
}

#[tokio::test]
async fn test_fget_object_discards_oversized_partial() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("digits.txt");
    std::fs::write(dir.path().join("digits.txt.abc.part.osc"), b"0123456789-extra").unwrap();

    let transport = FakeTransport::new(object_server);
    let client = regional_client(transport.clone());
    client
        .fget_object("photos", "digits.txt", &target, &GetObjectOptions::default())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), CONTENT);
    let gets = gets(&transport);
    assert_eq!(gets.len(), 1);
    assert_eq!(gets[0].header("range"), None);
}

#[tokio::test]
async fn test_listen_reconnects_when_response_closes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let transport = FakeTransport::new(move |_| {
        let body: &[u8] = match counter.fetch_add(1, Ordering::SeqCst) {
            0 => b"{\"Records\":[{\"eventName\":\"s3:ObjectCreated:Put\"}]}\n\nnot json\n{\"Records\":[]}\n",
            _ => b"{\"Records\":[{\"eventName\":\"s3:ObjectRemoved:Delete\"}]}",
        };
        with_body(response(200), body)
    });
    let client = regional_client(transport.clone());

    let mut events = client
        .listen_bucket_notification("photos", "logs/", ".txt", &[])
        .unwrap();
    let first = events.next().await.unwrap().unwrap();
    assert_eq!(first["Records"][0]["eventName"], "s3:ObjectCreated:Put");
    let second = events.next().await.unwrap().unwrap();
    assert_eq!(second["Records"][0]["eventName"], "s3:ObjectRemoved:Delete");
    drop(events);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.query("prefix").as_deref(), Some("logs/"));
        assert_eq!(request.query("suffix").as_deref(), Some(".txt"));
        let events = request.url.query_pairs().filter(|(k, _)| k == "events").count();
        assert_eq!(events, 3);
    }
}

#[tokio::test]
async fn test_listen_rejected_for_aws() {
    let transport = FakeTransport::new(|_| response(200));
    let client = S3Client::builder("https://s3.amazonaws.com")
        .region("us-east-1")
        .credentials(Credentials::new("minioadmin", "minioadmin"))
        .transport(transport.clone())
        .build()
        .unwrap();

    let result = client.listen_bucket_notification("photos", "", "", &[]);
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_remove_objects_batches_of_1000() {
    let transport = FakeTransport::new(|req| {
        if body_text(req).contains("<Key>key-01500</Key>") {
            return xml(
                200,
                "<DeleteResult><Error><Key>key-01500</Key><Code>AccessDenied</Code>\
                 <Message>Access Denied</Message></Error></DeleteResult>",
            );
        }
        xml(200, "<DeleteResult></DeleteResult>")
    });
    let client = regional_client(transport.clone());

    let objects: Vec<DeleteObject> = (0..2500).map(|i| DeleteObject::new(format!("key-{i:05}"))).collect();
    let errors = client.remove_objects("photos", &objects, false).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].name.as_deref(), Some("key-01500"));
    assert_eq!(errors[0].code, "AccessDenied");

    let requests = transport.with_query("delete");
    let sizes: Vec<usize> = requests
        .iter()
        .map(|r| body_text(r).matches("<Object>").count())
        .collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);
    for request in &requests {
        assert_eq!(request.method, Method::POST);
        assert!(request.header("content-md5").is_some());
        assert!(body_text(request).contains("<Quiet>true</Quiet>"));
        assert!(request.header("x-amz-bypass-governance-retention").is_none());
    }
}
