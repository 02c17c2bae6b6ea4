//! rb command - Remove bucket
//!
//! With `--force` every object (and every version) is deleted first.

use clap::Args;
use futures::TryStreamExt;
use osc_core::Result;
use osc_s3::{DeleteObject, ListObjectsOptions, S3Client};
use serde::Serialize;

use super::{connect, fail, remote_arg};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct RbArgs {
    /// Bucket path (alias/bucket)
    pub target: String,

    /// Delete all objects and versions before removing the bucket
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct RbOutput {
    bucket: String,
    objects_removed: usize,
}

/// Delete every object version in `bucket`; returns how many were removed
async fn empty_bucket(client: &S3Client, bucket: &str, formatter: &Formatter) -> Result<usize> {
    let options = ListObjectsOptions {
        recursive: true,
        include_version: true,
        ..Default::default()
    };
    let objects: Vec<DeleteObject> = client
        .list_objects(bucket, options)?
        .try_filter(|info| futures::future::ready(!info.is_dir))
        .map_ok(|info| match info.version_id {
            Some(version_id) => DeleteObject::new(info.key).with_version(version_id),
            None => DeleteObject::new(info.key),
        })
        .try_collect()
        .await?;

    let errors = client.remove_objects(bucket, &objects, false).await?;
    for error in &errors {
        formatter.warning(&format!(
            "Failed to remove {}: {} ({})",
            error.name.as_deref().unwrap_or("?"),
            error.message,
            error.code
        ));
    }
    Ok(objects.len() - errors.len())
}

pub async fn execute(args: RbArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let target = match remote_arg(&formatter, &args.target) {
        Ok(target) => target,
        Err(code) => return code,
    };
    let bucket = match target.require_bucket() {
        Ok(bucket) => bucket.to_string(),
        Err(e) => return fail(&formatter, "Invalid path", &e),
    };
    let client = match connect(&target) {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };

    let mut removed = 0;
    if args.force {
        removed = match empty_bucket(&client, &bucket, &formatter).await {
            Ok(removed) => removed,
            Err(e) => return fail(&formatter, &format!("Failed to empty '{target}'"), &e),
        };
    }

    if let Err(e) = client.remove_bucket(&bucket).await {
        return fail(&formatter, &format!("Failed to remove bucket '{target}'"), &e);
    }
    formatter.output(
        &RbOutput {
            bucket,
            objects_removed: removed,
        },
        |_| format!("Bucket '{target}' removed."),
    );
    ExitCode::Success
}
