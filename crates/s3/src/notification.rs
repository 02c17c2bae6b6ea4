//! Bucket notification listening (MinIO extension)
//!
//! The server keeps the response open and writes one JSON document per
//! line. When it closes the response the request is issued again, so the
//! stream only ends on error or when the consumer drops it.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use http::Method;
use osc_core::{Error, Result};
use serde_json::Value;

use crate::executor::{RequestExecutor, S3Request};

/// Events listened for when none are given
pub const DEFAULT_EVENTS: [&str; 3] = [
    "s3:ObjectCreated:*",
    "s3:ObjectRemoved:*",
    "s3:ObjectAccessed:*",
];

struct Listener {
    executor: Arc<RequestExecutor>,
    request: S3Request,
    body: Option<BoxStream<'static, Result<Bytes>>>,
    buf: BytesMut,
}

/// A decoded event document that carries records
fn decode_line(line: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    let event: Value = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, "skipping undecodable notification line");
            return None;
        }
    };
    let has_records = event
        .get("Records")
        .and_then(Value::as_array)
        .is_some_and(|records| !records.is_empty());
    has_records.then_some(event)
}

impl Listener {
    async fn next_event(mut self) -> Result<Option<(Value, Self)>> {
        loop {
            while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
                let line = self.buf.split_to(pos + 1);
                if let Some(event) = decode_line(&line[..pos]) {
                    return Ok(Some((event, self)));
                }
            }

            match &mut self.body {
                Some(body) => match body.next().await {
                    Some(chunk) => self.buf.extend_from_slice(&chunk?),
                    None => {
                        // Response closed: flush a trailing line, then reconnect
                        self.body = None;
                        let rest = self.buf.split();
                        if let Some(event) = decode_line(&rest) {
                            return Ok(Some((event, self)));
                        }
                    }
                },
                None => {
                    let response = self.executor.execute(self.request.clone()).await?;
                    tracing::debug!("listening for bucket notifications");
                    self.body = Some(response.body.into_stream());
                }
            }
        }
    }
}

/// Stream notification records for `bucket`.
///
/// Fails immediately for AWS endpoints, which do not offer this API.
pub fn listen_bucket_notification(
    executor: Arc<RequestExecutor>,
    bucket: &str,
    prefix: &str,
    suffix: &str,
    events: &[String],
) -> Result<BoxStream<'static, Result<Value>>> {
    if executor.base_url().is_aws_host() {
        return Err(Error::Config(
            "ListenBucketNotification API is not supported in Amazon S3".into(),
        ));
    }

    let mut request = S3Request::new(Method::GET)
        .bucket(bucket)
        .query("prefix", prefix)
        .query("suffix", suffix);
    if events.is_empty() {
        for event in DEFAULT_EVENTS {
            request = request.query("events", event);
        }
    } else {
        for event in events {
            request = request.query("events", event.as_str());
        }
    }

    let listener = Listener {
        executor,
        request,
        body: None,
        buf: BytesMut::new(),
    };
    Ok(stream::try_unfold(listener, Listener::next_event).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line() {
        assert!(decode_line(b"").is_none());
        assert!(decode_line(b"   ").is_none());
        assert!(decode_line(b"not json").is_none());
        assert!(decode_line(br#"{"Records":[]}"#).is_none());
        let event = decode_line(br#"{"Records":[{"eventName":"s3:ObjectCreated:Put"}]}"#).unwrap();
        assert_eq!(event["Records"][0]["eventName"], "s3:ObjectCreated:Put");
    }
}
