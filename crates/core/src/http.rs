//! HTTP value types exchanged with the transport capability
//!
//! These types are deliberately plain: the executor builds an [`HttpRequest`],
//! the transport turns it into an [`HttpResponse`], and nothing else about the
//! underlying HTTP client leaks into the rest of the code.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::error::Result;

/// A fully built, ready-to-send request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the query string contains `key`
    pub fn has_query(&self, key: &str) -> bool {
        self.url.query_pairs().any(|(k, _)| k == key)
    }

    /// Value of query parameter `key`
    pub fn query(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

/// Response body, either fully buffered or still streaming from the peer.
///
/// Dropping a streaming body releases the underlying connection.
pub enum ResponseBody {
    Full(Bytes),
    Stream(BoxStream<'static, Result<Bytes>>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        ResponseBody::Full(Bytes::new())
    }

    /// Drain the body into memory
    pub async fn bytes(self) -> Result<Bytes> {
        match self {
            ResponseBody::Full(data) => Ok(data),
            ResponseBody::Stream(mut chunks) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = chunks.try_next().await? {
                    buf.extend_from_slice(&chunk);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// View the body as a stream of chunks
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes>> {
        match self {
            ResponseBody::Full(data) if data.is_empty() => stream::empty().boxed(),
            ResponseBody::Full(data) => stream::once(async move { Ok(data) }).boxed(),
            ResponseBody::Stream(chunks) => chunks,
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Full(data) => write!(f, "Full({} bytes)", data.len()),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(data: Bytes) -> Self {
        ResponseBody::Full(data)
    }
}

/// Response as returned by the transport
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::empty(),
        }
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Drain the body into memory
    pub async fn bytes(self) -> Result<Bytes> {
        self.body.bytes().await
    }

    /// Drain the body and decode it as (lossy) UTF-8
    pub async fn text(self) -> Result<String> {
        let data = self.body.bytes().await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}
