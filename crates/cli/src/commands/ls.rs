//! ls command - List buckets and objects
//!
//! `alias` lists buckets; `alias/bucket[/prefix]` lists objects, or
//! incomplete multipart uploads with `--incomplete`.

use clap::Args;
use futures::TryStreamExt;
use jiff::Timestamp;
use osc_core::Result;
use osc_s3::{ListObjectsOptions, ObjectInfo, S3Client};
use serde::Serialize;

use super::{connect, fail, remote_arg};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Remote path (alias, alias/bucket or alias/bucket/prefix)
    pub path: String,

    /// List recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Include all object versions and delete markers
    #[arg(long)]
    pub versions: bool,

    /// List incomplete multipart uploads instead of objects
    #[arg(long)]
    pub incomplete: bool,

    /// Use ListObjects (v1) instead of ListObjectsV2
    #[arg(long)]
    pub api_v1: bool,

    /// Print totals after the listing
    #[arg(long)]
    pub summarize: bool,
}

#[derive(Debug, Serialize)]
struct Entry {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<Timestamp>,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_dir: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_delete_marker: bool,
}

impl From<ObjectInfo> for Entry {
    fn from(info: ObjectInfo) -> Self {
        Self {
            key: info.key,
            last_modified: info.last_modified,
            size: info.size,
            etag: info.etag,
            version_id: info.version_id,
            is_dir: info.is_dir,
            is_delete_marker: info.is_delete_marker,
        }
    }
}

#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<Entry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_objects: usize,
    total_size_bytes: u64,
    total_size_human: String,
}

fn format_date(ts: Option<Timestamp>) -> String {
    ts.map(|d| d.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| " ".repeat(19))
}

fn human_size(size: u64) -> String {
    humansize::format_size(size, humansize::BINARY)
}

fn render(output: &LsOutput) -> String {
    let mut lines: Vec<String> = output
        .items
        .iter()
        .map(|item| {
            let date = format_date(item.last_modified);
            if item.is_dir {
                format!("[{date}] {:>10} {}", "PRE", item.key)
            } else if item.is_delete_marker {
                format!("[{date}] {:>10} {} (delete marker)", "DEL", item.key)
            } else {
                let version = item
                    .version_id
                    .as_deref()
                    .map(|v| format!(" v{v}"))
                    .unwrap_or_default();
                format!("[{date}] {:>10} {}{version}", human_size(item.size), item.key)
            }
        })
        .collect();
    if let Some(summary) = &output.summary {
        lines.push(format!(
            "\nTotal: {} objects, {}",
            summary.total_objects, summary.total_size_human
        ));
    }
    lines.join("\n")
}

async fn list_buckets(client: &S3Client) -> Result<Vec<Entry>> {
    Ok(client
        .list_buckets()
        .await?
        .into_iter()
        .map(|bucket| Entry {
            key: format!("{}/", bucket.name),
            last_modified: bucket.creation_date,
            size: 0,
            etag: None,
            version_id: None,
            is_dir: true,
            is_delete_marker: false,
        })
        .collect())
}

async fn list_uploads(client: &S3Client, bucket: &str, prefix: Option<&str>, recursive: bool) -> Result<Vec<Entry>> {
    Ok(client
        .list_incomplete_uploads(bucket, prefix, recursive)
        .await?
        .into_iter()
        .map(|upload| Entry {
            key: upload.key,
            last_modified: upload.initiated,
            size: 0,
            etag: None,
            version_id: Some(upload.upload_id),
            is_dir: false,
            is_delete_marker: false,
        })
        .collect())
}

pub async fn execute(args: LsArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let path = match remote_arg(&formatter, &args.path) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let client = match connect(&path) {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };

    let items = match path.bucket.as_deref() {
        None => list_buckets(&client).await,
        Some(bucket) if args.incomplete => {
            list_uploads(&client, bucket, path.object.as_deref(), args.recursive).await
        }
        Some(bucket) => {
            let options = ListObjectsOptions {
                prefix: path.object.clone(),
                recursive: args.recursive,
                include_version: args.versions,
                use_api_v1: args.api_v1,
                ..Default::default()
            };
            match client.list_objects(bucket, options) {
                Ok(stream) => stream.map_ok(Entry::from).try_collect().await,
                Err(e) => Err(e),
            }
        }
    };
    let items = match items {
        Ok(items) => items,
        Err(e) => return fail(&formatter, &format!("Failed to list '{path}'"), &e),
    };

    let summary = args.summarize.then(|| {
        let objects = items.iter().filter(|i| !i.is_dir && !i.is_delete_marker);
        let total_size_bytes: u64 = objects.clone().map(|i| i.size).sum();
        Summary {
            total_objects: objects.count(),
            total_size_bytes,
            total_size_human: human_size(total_size_bytes),
        }
    });
    formatter.output(&LsOutput { items, summary }, render);
    ExitCode::Success
}
