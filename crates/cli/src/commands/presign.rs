//! presign command - Generate a presigned URL

use std::collections::BTreeMap;

use clap::{Args, ValueEnum};
use http::Method;
use osc_s3::{MAX_PRESIGN_EXPIRY, PresignOptions};
use serde::Serialize;

use super::{connect, fail, remote_arg};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PresignMethod {
    Get,
    Put,
    Head,
    Delete,
}

impl From<PresignMethod> for Method {
    fn from(method: PresignMethod) -> Self {
        match method {
            PresignMethod::Get => Method::GET,
            PresignMethod::Put => Method::PUT,
            PresignMethod::Head => Method::HEAD,
            PresignMethod::Delete => Method::DELETE,
        }
    }
}

#[derive(Args, Debug)]
pub struct PresignArgs {
    /// Object path (alias/bucket/key)
    pub path: String,

    /// HTTP method the URL is valid for
    #[arg(long, value_enum, default_value = "get")]
    pub method: PresignMethod,

    /// Lifetime, e.g. 3600, 90m, 12h or 7d
    #[arg(long, default_value = "7d")]
    pub expire: String,

    /// Override the response Content-Type (GET only)
    #[arg(long)]
    pub content_type: Option<String>,

    /// Override the response Content-Disposition (GET only)
    #[arg(long)]
    pub content_disposition: Option<String>,

    #[arg(long)]
    pub version_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct PresignOutput {
    url: String,
    method: String,
    expires_seconds: u64,
}

/// Parse a duration such as `3600`, `90s`, `15m`, `12h` or `7d` into seconds
fn parse_expiry(value: &str) -> osc_core::Result<u64> {
    let value = value.trim();
    let (digits, multiplier) = match value.char_indices().last() {
        Some((i, 's')) => (&value[..i], 1),
        Some((i, 'm')) => (&value[..i], 60),
        Some((i, 'h')) => (&value[..i], 60 * 60),
        Some((i, 'd')) => (&value[..i], 24 * 60 * 60),
        _ => (value, 1),
    };
    let number: u64 = digits
        .parse()
        .map_err(|_| osc_core::Error::Config(format!("invalid expiry '{value}'")))?;
    number
        .checked_mul(multiplier)
        .ok_or_else(|| osc_core::Error::Config(format!("expiry '{value}' is too large")))
}

pub async fn execute(args: PresignArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let path = match remote_arg(&formatter, &args.path) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (bucket, object) = match path.require_object() {
        Ok(names) => names,
        Err(e) => return fail(&formatter, "Invalid path", &e),
    };
    let expires = match parse_expiry(&args.expire) {
        Ok(expires) => expires,
        Err(e) => return fail(&formatter, "Invalid expiry", &e),
    };
    let client = match connect(&path) {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };

    let mut response_headers = BTreeMap::new();
    if let Some(content_type) = &args.content_type {
        response_headers.insert("response-content-type".to_string(), content_type.clone());
    }
    if let Some(disposition) = &args.content_disposition {
        response_headers.insert("response-content-disposition".to_string(), disposition.clone());
    }
    let options = PresignOptions {
        expires,
        response_headers,
        version_id: args.version_id.clone(),
        ..Default::default()
    };

    let method = Method::from(args.method);
    match client.presigned_url(method.clone(), bucket, object, &options).await {
        Ok(url) => {
            formatter.output(
                &PresignOutput {
                    url: url.to_string(),
                    method: method.to_string(),
                    expires_seconds: expires,
                },
                |out| out.url.clone(),
            );
            ExitCode::Success
        }
        Err(e) => fail(
            &formatter,
            &format!("Failed to presign '{path}' (expiry must be 1s to {MAX_PRESIGN_EXPIRY}s)"),
            &e,
        ),
    }
}
