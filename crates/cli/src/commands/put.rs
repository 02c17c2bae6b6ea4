//! put command - Upload a file or stdin
//!
//! Files are uploaded with their exact size; stdin (`-`) is streamed with
//! the size discovered while reading.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use clap::Args;
use osc_core::{Defaults, Error, ReaderSource, RemotePath, Result};
use osc_s3::{ObjectWriteResult, PutObjectOptions, S3Client, Sse};
use serde::Serialize;

use super::{connect, fail, remote_arg};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, TransferProgress};

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file, or `-` for stdin
    pub source: String,

    /// Destination (alias/bucket/key, or alias/bucket/prefix/ to keep the file name)
    pub target: String,

    /// Content type; guessed from the file name when omitted
    #[arg(long)]
    pub content_type: Option<String>,

    /// User metadata as key=value (repeatable)
    #[arg(long = "attr", value_name = "KEY=VALUE")]
    pub attrs: Vec<String>,

    /// Part size, e.g. 16MiB; computed from the object size when omitted
    #[arg(long)]
    pub part_size: Option<String>,

    /// Parts uploaded concurrently
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Encrypt with S3-managed keys
    #[arg(long, conflicts_with = "sse_kms")]
    pub sse_s3: bool,

    /// Encrypt with the given KMS key id
    #[arg(long)]
    pub sse_kms: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutOutput {
    source: String,
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_id: Option<String>,
}

/// Parse a byte size such as `5242880`, `64MiB`, `64M` or `1GiB`
fn parse_size(value: &str) -> Result<u64> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let number: u64 = digits
        .parse()
        .map_err(|_| Error::Config(format!("invalid size '{value}'")))?;
    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        _ => return Err(Error::Config(format!("invalid size unit in '{value}'"))),
    };
    number
        .checked_mul(multiplier)
        .ok_or_else(|| Error::Config(format!("size '{value}' is too large")))
}

fn parse_attrs(attrs: &[String]) -> Result<BTreeMap<String, String>> {
    attrs
        .iter()
        .map(|attr| match attr.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(Error::Config(format!("metadata '{attr}' is not KEY=VALUE"))),
        })
        .collect()
}

/// Object key for `source` under `target`
fn object_key(source: &str, target: &RemotePath) -> Result<String> {
    let file_name = || {
        Path::new(source)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|_| source != "-")
            .ok_or_else(|| Error::InvalidPath(format!("'{target}' needs an object name for stdin uploads")))
    };
    match target.object.as_deref() {
        None | Some("") => file_name(),
        Some(prefix) if prefix.ends_with('/') => Ok(format!("{prefix}{}", file_name()?)),
        Some(object) => Ok(object.to_string()),
    }
}

fn put_options(args: &PutArgs, defaults: &Defaults, key: &str) -> Result<PutObjectOptions> {
    let content_type = args.content_type.clone().or_else(|| {
        let guess_from = if args.source == "-" { key } else { args.source.as_str() };
        mime_guess::from_path(guess_from)
            .first()
            .map(|mime| mime.essence_str().to_string())
    });
    let sse = match (&args.sse_kms, args.sse_s3) {
        (Some(key_id), _) => Some(Sse::Kms {
            key_id: key_id.clone(),
            context: None,
        }),
        (None, true) => Some(Sse::S3),
        (None, false) => None,
    };
    Ok(PutObjectOptions {
        content_type,
        metadata: parse_attrs(&args.attrs)?,
        sse,
        part_size: args.part_size.as_deref().map(parse_size).transpose()?.or(defaults.part_size),
        parallel_uploads: args.parallel.unwrap_or(defaults.parallel_uploads).max(1),
        progress: None,
    })
}

async fn upload(client: &S3Client, bucket: &str, key: &str, source: &str, options: &PutObjectOptions) -> Result<ObjectWriteResult> {
    if source == "-" {
        let stdin = ReaderSource::new(tokio::io::stdin());
        client.put_object(bucket, key, stdin, None, options).await
    } else {
        client.fput_object(bucket, key, Path::new(source), options).await
    }
}

pub async fn execute(args: PutArgs, output_config: OutputConfig, defaults: &Defaults) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let target = match remote_arg(&formatter, &args.target) {
        Ok(target) => target,
        Err(code) => return code,
    };
    let bucket = match target.require_bucket() {
        Ok(bucket) => bucket.to_string(),
        Err(e) => return fail(&formatter, "Invalid path", &e),
    };
    let key = match object_key(&args.source, &target) {
        Ok(key) => key,
        Err(e) => return fail(&formatter, "Invalid path", &e),
    };
    let mut options = match put_options(&args, defaults, &key) {
        Ok(options) => options,
        Err(e) => return fail(&formatter, "Invalid options", &e),
    };
    let client = match connect(&target) {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };

    let progress = Arc::new(TransferProgress::new(formatter.config()));
    options.progress = Some(progress.clone());
    let result = upload(&client, &bucket, &key, &args.source, &options).await;
    progress.finish();

    let written = match result {
        Ok(written) => written,
        Err(e) => return fail(&formatter, &format!("Failed to upload '{}'", args.source), &e),
    };
    let dest = format!("{}/{}/{}", target.alias, bucket, key);
    formatter.output(
        &PutOutput {
            source: args.source.clone(),
            target: dest.clone(),
            etag: written.etag,
            version_id: written.version_id,
        },
        |_| format!("{} -> {dest}", args.source),
    );
    ExitCode::Success
}
