//! In-process transport for scenario tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderValue, StatusCode};
use osc_core::{Credentials, HttpRequest, HttpResponse, ResponseBody, Result, Transport};
use osc_s3::S3Client;

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Answers every request with `handler` and records what was sent
pub struct FakeTransport {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new(handler: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests whose query contains `key`
    pub fn with_query(&self, key: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.has_query(key))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = (self.handler)(&request);
        self.requests.lock().unwrap().push(request);
        Ok(response)
    }
}

pub fn response(status: u16) -> HttpResponse {
    HttpResponse::new(StatusCode::from_u16(status).unwrap())
}

pub fn with_header(mut response: HttpResponse, name: &'static str, value: &str) -> HttpResponse {
    response.headers.insert(name, HeaderValue::from_str(value).unwrap());
    response
}

pub fn xml(status: u16, body: &str) -> HttpResponse {
    let mut response = with_header(response(status), "content-type", "application/xml");
    response.body = ResponseBody::Full(Bytes::from(body.to_string()));
    response
}

pub fn error_xml(status: u16, code: &str) -> HttpResponse {
    xml(
        status,
        &format!("<Error><Code>{code}</Code><Message>{code}</Message><RequestId>req-1</RequestId></Error>"),
    )
}

/// Signed client over `transport` against a local path-style endpoint
pub fn client(transport: Arc<FakeTransport>) -> S3Client {
    S3Client::builder("http://localhost:9000")
        .credentials(Credentials::new("minioadmin", "minioadmin"))
        .transport(transport)
        .build()
        .unwrap()
}

/// Like [`client`], with the region fixed so no location lookups happen
pub fn regional_client(transport: Arc<FakeTransport>) -> S3Client {
    S3Client::builder("http://localhost:9000")
        .region("us-east-1")
        .credentials(Credentials::new("minioadmin", "minioadmin"))
        .transport(transport)
        .build()
        .unwrap()
}
