//! stat command - Show object or bucket metadata

use std::collections::BTreeMap;

use clap::Args;
use jiff::Timestamp;
use osc_s3::ObjectStat;
use serde::Serialize;

use super::{connect, fail, remote_arg};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object path (alias/bucket/key) or bucket path (alias/bucket)
    pub path: String,

    /// Inspect a specific version
    #[arg(long)]
    pub version_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    name: String,
    size: u64,
    size_human: String,
    etag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

impl StatOutput {
    fn new(name: String, stat: ObjectStat) -> Self {
        Self {
            name,
            size: stat.size,
            size_human: humansize::format_size(stat.size, humansize::BINARY),
            etag: stat.etag,
            last_modified: stat.last_modified,
            content_type: stat.content_type,
            version_id: stat.version_id,
            metadata: stat.metadata,
        }
    }
}

fn render(output: &StatOutput) -> String {
    let mut lines = vec![
        format!("Name      : {}", output.name),
        format!("Size      : {} ({} bytes)", output.size_human, output.size),
        format!("ETag      : {}", output.etag),
    ];
    if let Some(ts) = output.last_modified {
        lines.push(format!("Modified  : {}", ts.strftime("%Y-%m-%d %H:%M:%S UTC")));
    }
    if let Some(content_type) = &output.content_type {
        lines.push(format!("Type      : {content_type}"));
    }
    if let Some(version_id) = &output.version_id {
        lines.push(format!("VersionID : {version_id}"));
    }
    if !output.metadata.is_empty() {
        lines.push("Metadata  :".to_string());
        for (key, value) in &output.metadata {
            lines.push(format!("  {key}: {value}"));
        }
    }
    lines.join("\n")
}

pub async fn execute(args: StatArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let path = match remote_arg(&formatter, &args.path) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let client = match connect(&path) {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };

    if path.object.is_none() {
        let bucket = match path.require_bucket() {
            Ok(bucket) => bucket,
            Err(e) => return fail(&formatter, "Invalid path", &e),
        };
        return match client.bucket_exists(bucket).await {
            Ok(true) => {
                formatter.output(&serde_json::json!({ "bucket": bucket, "exists": true }), |_| {
                    format!("Bucket '{path}' exists.")
                });
                ExitCode::Success
            }
            Ok(false) => {
                formatter.error(&format!("Bucket '{path}' does not exist"));
                ExitCode::NotFound
            }
            Err(e) => fail(&formatter, &format!("Failed to stat '{path}'"), &e),
        };
    }

    let (bucket, object) = match path.require_object() {
        Ok(names) => names,
        Err(e) => return fail(&formatter, "Invalid path", &e),
    };
    match client
        .stat_object(bucket, object, None, args.version_id.as_deref())
        .await
    {
        Ok(stat) => {
            formatter.output(&StatOutput::new(path.to_string(), stat), render);
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &format!("Failed to stat '{path}'"), &e),
    }
}
