//! mb command - Make bucket

use clap::Args;
use serde::Serialize;

use super::{connect, fail, remote_arg};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct MbArgs {
    /// Target path (alias/bucket)
    pub target: String,

    /// Succeed if the bucket already exists
    #[arg(short = 'p', long)]
    pub ignore_existing: bool,

    /// Region to create the bucket in
    #[arg(long)]
    pub region: Option<String>,

    /// Enable object locking on the bucket
    #[arg(long)]
    pub with_lock: bool,
}

#[derive(Debug, Serialize)]
struct MbOutput {
    bucket: String,
    status: &'static str,
}

pub async fn execute(args: MbArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let target = match remote_arg(&formatter, &args.target) {
        Ok(target) => target,
        Err(code) => return code,
    };
    if target.object.is_some() {
        formatter.error(&format!("'{}' names an object, expected alias/bucket", args.target));
        return ExitCode::UsageError;
    }
    let bucket = match target.require_bucket() {
        Ok(bucket) => bucket.to_string(),
        Err(e) => return fail(&formatter, "Invalid path", &e),
    };
    let client = match connect(&target) {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };

    let status = match client
        .make_bucket(&bucket, args.region.as_deref(), args.with_lock)
        .await
    {
        Ok(()) => "created",
        Err(e) if args.ignore_existing && e.has_code(&["BucketAlreadyOwnedByYou", "BucketAlreadyExists"]) => {
            "exists"
        }
        Err(e) => return fail(&formatter, &format!("Failed to create bucket '{target}'"), &e),
    };

    formatter.output(&MbOutput { bucket, status }, |_| match status {
        "exists" => format!("Bucket '{target}' already exists."),
        _ => format!("Bucket '{target}' created."),
    });
    ExitCode::Success
}
