//! get command - Download an object to a file
//!
//! Interrupted downloads resume from the partial file on the next run.

use std::path::PathBuf;

use clap::Args;
use osc_s3::GetObjectOptions;
use serde::Serialize;

use super::{connect, fail, remote_arg};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Object path (alias/bucket/key)
    pub source: String,

    /// Local file; a directory keeps the object's base name
    pub target: PathBuf,

    /// Download a specific version
    #[arg(long)]
    pub version_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    source: String,
    target: String,
    size: u64,
    etag: String,
}

pub async fn execute(args: GetArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let source = match remote_arg(&formatter, &args.source) {
        Ok(source) => source,
        Err(code) => return code,
    };
    let (bucket, object) = match source.require_object() {
        Ok(names) => names,
        Err(e) => return fail(&formatter, "Invalid path", &e),
    };
    let client = match connect(&source) {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };

    let target = if args.target.is_dir() {
        args.target.join(object.rsplit('/').next().unwrap_or(object))
    } else {
        args.target.clone()
    };
    let options = GetObjectOptions {
        version_id: args.version_id.clone(),
        ..Default::default()
    };

    match client.fget_object(bucket, object, &target, &options).await {
        Ok(stat) => {
            let target = target.display().to_string();
            formatter.output(
                &GetOutput {
                    source: source.to_string(),
                    target: target.clone(),
                    size: stat.size,
                    etag: stat.etag,
                },
                |_| format!("{source} -> {target}"),
            );
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &format!("Failed to download '{source}'"), &e),
    }
}
