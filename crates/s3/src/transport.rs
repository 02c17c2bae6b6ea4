//! reqwest-backed transport
//!
//! Owns connection pooling, TLS roots and transient-failure retries.
//! Protocol-level failures (4xx, redirects) are passed through untouched.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use osc_core::{
    Error, HttpRequest, HttpResponse, ResponseBody, Result, RetryConfig, TimeoutConfig, Transport,
};

/// Statuses retried by the transport
const RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Idle connections kept per host
const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Transport settings
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Skip certificate verification
    pub insecure: bool,
    /// PEM bundle replacing the built-in roots; falls back to `SSL_CERT_FILE`
    pub ca_bundle: Option<PathBuf>,
    pub retry: RetryConfig,
    pub timeout: TimeoutConfig,
}

/// HTTP transport over a pooled reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpTransport {
    pub fn new(options: TransportOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .connect_timeout(Duration::from_millis(options.timeout.connect_ms))
            .read_timeout(Duration::from_millis(options.timeout.read_ms))
            .danger_accept_invalid_certs(options.insecure)
            // Redirects are classified by the caller, never followed
            .redirect(reqwest::redirect::Policy::none());

        let ca_bundle = options.ca_bundle.or_else(|| {
            std::env::var_os("SSL_CERT_FILE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        });
        if let Some(path) = ca_bundle {
            let pem = std::fs::read(&path).map_err(|e| {
                Error::Config(format!("Failed to read CA bundle {}: {e}", path.display()))
            })?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                Error::Config(format!("Invalid CA bundle {}: {e}", path.display()))
            })?;
            builder = builder.tls_built_in_root_certs(false);
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            retry: options.retry,
        })
    }

    fn is_transient(err: &reqwest::Error) -> bool {
        err.is_connect() || err.is_timeout()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let mut builder = self
                .client
                .request(request.method.clone(), request.url.clone())
                .headers(request.headers.clone());
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            let last_attempt = attempt + 1 >= max_attempts;
            match builder.send().await {
                Ok(response)
                    if !last_attempt && RETRY_STATUSES.contains(&response.status().as_u16()) =>
                {
                    tracing::warn!(
                        method = %request.method,
                        url = %request.url,
                        status = response.status().as_u16(),
                        attempt = attempt + 1,
                        "retrying request after server error"
                    );
                }
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    let chunks = response
                        .bytes_stream()
                        .map_err(|e| Error::Network(format!("Failed to read response: {e}")))
                        .boxed();
                    return Ok(HttpResponse {
                        status,
                        headers,
                        body: ResponseBody::Stream(chunks),
                    });
                }
                Err(e) if !last_attempt && Self::is_transient(&e) => {
                    tracing::warn!(
                        method = %request.method,
                        url = %request.url,
                        error = %e,
                        attempt = attempt + 1,
                        "retrying request after connection error"
                    );
                }
                Err(e) => return Err(Error::Network(format!("Request failed: {e}"))),
            }

            tokio::time::sleep(Duration::from_millis(self.retry.backoff_ms(attempt))).await;
            attempt += 1;
        }
    }
}
