//! rm command - Remove objects
//!
//! A key removes one object. A prefix (trailing `/`) or `--recursive`
//! removes everything below it in batches of up to 1000 keys.

use std::collections::HashSet;

use clap::Args;
use futures::TryStreamExt;
use osc_core::{RemotePath, Result};
use osc_s3::{DeleteError, DeleteObject, ListObjectsOptions, S3Client};
use serde::Serialize;

use super::{connect, fail, remote_arg};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object path(s) (alias/bucket/key or alias/bucket/prefix/)
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Remove every object under the prefix
    #[arg(short, long)]
    pub recursive: bool,

    /// Ignore objects that do not exist
    #[arg(short, long)]
    pub force: bool,

    /// Print what would be removed without removing it
    #[arg(long)]
    pub dry_run: bool,

    /// Abort incomplete multipart uploads instead of removing objects
    #[arg(long)]
    pub incomplete: bool,

    /// Remove every version, including delete markers
    #[arg(long)]
    pub versions: bool,

    /// Remove a specific version of a single object
    #[arg(long, conflicts_with_all = ["recursive", "versions"])]
    pub version_id: Option<String>,

    /// Bypass governance-mode retention
    #[arg(long)]
    pub bypass: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    deleted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<String>,
}

#[derive(Debug, Default)]
struct Outcome {
    deleted: Vec<String>,
    failed: Vec<String>,
}

fn display_key(path: &RemotePath, bucket: &str, key: &str, version_id: Option<&str>) -> String {
    match version_id {
        Some(version_id) => format!("{}/{bucket}/{key} ({version_id})", path.alias),
        None => format!("{}/{bucket}/{key}", path.alias),
    }
}

/// Partition `objects` into deleted and failed by the server's error list.
///
/// An error without a key failed the whole batch.
fn split_failed(objects: Vec<DeleteObject>, errors: &[DeleteError]) -> (Vec<DeleteObject>, Vec<DeleteObject>) {
    if errors.iter().any(|e| e.name.is_none()) {
        return (Vec::new(), objects);
    }
    let failed: HashSet<&str> = errors.iter().filter_map(|e| e.name.as_deref()).collect();
    objects
        .into_iter()
        .partition(|o| !failed.contains(o.name.as_str()))
}

async fn remove_tree(
    client: &S3Client,
    path: &RemotePath,
    bucket: &str,
    prefix: Option<&str>,
    args: &RmArgs,
) -> Result<Outcome> {
    let options = ListObjectsOptions {
        prefix: prefix.map(str::to_string),
        recursive: true,
        include_version: args.versions,
        ..Default::default()
    };
    let objects: Vec<DeleteObject> = client
        .list_objects(bucket, options)?
        .try_filter(|info| futures::future::ready(!info.is_dir))
        .map_ok(|info| DeleteObject {
            name: info.key,
            version_id: info.version_id.filter(|_| args.versions),
        })
        .try_collect()
        .await?;

    let names = |objects: &[DeleteObject]| -> Vec<String> {
        objects
            .iter()
            .map(|o| display_key(path, bucket, &o.name, o.version_id.as_deref()))
            .collect()
    };
    if args.dry_run {
        return Ok(Outcome {
            deleted: names(&objects),
            failed: Vec::new(),
        });
    }

    let errors = client.remove_objects(bucket, &objects, args.bypass).await?;
    let (deleted, failed) = split_failed(objects, &errors);
    for error in &errors {
        tracing::warn!(key = ?error.name, code = %error.code, "delete failed");
    }
    Ok(Outcome {
        deleted: names(&deleted),
        failed: names(&failed),
    })
}

async fn remove_path(client: &S3Client, path: &RemotePath, args: &RmArgs) -> Result<Outcome> {
    let bucket = path.require_bucket()?;
    let mut outcome = Outcome::default();

    if args.incomplete {
        let object = path.object.as_deref().unwrap_or_default();
        let uploads = client
            .list_incomplete_uploads(bucket, Some(object), args.recursive || path.is_prefix())
            .await?;
        for upload in uploads {
            if !args.dry_run {
                client.remove_incomplete_upload(bucket, &upload.key).await?;
            }
            outcome.deleted.push(display_key(path, bucket, &upload.key, Some(&upload.upload_id)));
        }
        return Ok(outcome);
    }

    if args.recursive || path.is_prefix() {
        return remove_tree(client, path, bucket, path.object.as_deref(), args).await;
    }

    let (_, object) = path.require_object()?;
    let version_id = args.version_id.as_deref();
    if !args.dry_run {
        if args.force && version_id.is_none() {
            match client.stat_object(bucket, object, None, None).await {
                Err(e) if e.has_code(&["NoSuchKey"]) => return Ok(outcome),
                other => {
                    other?;
                }
            }
        }
        client.remove_object(bucket, object, version_id).await?;
    }
    outcome.deleted.push(display_key(path, bucket, object, version_id));
    Ok(outcome)
}

pub async fn execute(args: RmArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let mut total = Outcome::default();
    let mut exit_code = ExitCode::Success;

    for raw in &args.paths {
        let path = match remote_arg(&formatter, raw) {
            Ok(path) => path,
            Err(code) => return code,
        };
        let client = match connect(&path) {
            Ok(client) => client,
            Err(e) => return fail(&formatter, "Failed to create client", &e),
        };
        match remove_path(&client, &path, &args).await {
            Ok(outcome) => {
                if !formatter.is_json() {
                    let verb = if args.dry_run { "Would remove" } else { "Removed" };
                    for name in &outcome.deleted {
                        formatter.println(&format!("{verb}: {name}"));
                    }
                    for name in &outcome.failed {
                        formatter.error(&format!("Failed to remove: {name}"));
                    }
                }
                if !outcome.failed.is_empty() {
                    exit_code = ExitCode::GeneralError;
                }
                total.deleted.extend(outcome.deleted);
                total.failed.extend(outcome.failed);
            }
            Err(e) => {
                exit_code = fail(&formatter, &format!("Failed to remove '{path}'"), &e);
                if matches!(exit_code, ExitCode::AuthError | ExitCode::UsageError) {
                    return exit_code;
                }
            }
        }
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            status: if exit_code == ExitCode::Success { "success" } else { "partial" },
            deleted: total.deleted,
            failed: total.failed,
        });
    }
    exit_code
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete_error(name: Option<&str>) -> DeleteError {
        DeleteError {
            code: "AccessDenied".to_string(),
            message: "Access Denied".to_string(),
            name: name.map(str::to_string),
            version_id: None,
        }
    }

    fn objects(names: &[&str]) -> Vec<DeleteObject> {
        names.iter().map(|n| DeleteObject::new(*n)).collect()
    }

    #[test]
    fn test_split_failed_by_key() {
        let (deleted, failed) = split_failed(objects(&["a", "b", "c"]), &[delete_error(Some("b"))]);
        assert_eq!(deleted, objects(&["a", "c"]));
        assert_eq!(failed, objects(&["b"]));
    }

    #[test]
    fn test_split_failed_large_batch() {
        let names: Vec<String> = (0..5000).map(|i| format!("logs/{i:05}")).collect();
        let all: Vec<DeleteObject> = names.iter().map(|n| DeleteObject::new(n.as_str())).collect();
        let errors: Vec<DeleteError> = names.iter().step_by(2).map(|n| delete_error(Some(n))).collect();

        let (deleted, failed) = split_failed(all, &errors);
        assert_eq!(deleted.len(), 2500);
        assert_eq!(failed.len(), 2500);
        assert_eq!(failed[0].name, "logs/00000");
        assert_eq!(deleted[0].name, "logs/00001");
    }

    #[test]
    fn test_split_failed_whole_batch() {
        let (deleted, failed) = split_failed(objects(&["a", "b"]), &[delete_error(None)]);
        assert!(deleted.is_empty());
        assert_eq!(failed.len(), 2);
    }
}
