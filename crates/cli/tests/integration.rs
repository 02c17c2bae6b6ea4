//! Integration tests for the osc CLI
//!
//! These tests require a running S3-compatible server.
//!
//! Run with:
//! ```bash
//! docker run -d --name minio -p 9000:9000 \
//!     -e MINIO_ROOT_USER=accesskey \
//!     -e MINIO_ROOT_PASSWORD=secretkey \
//!     minio/minio server /data
//!
//! TEST_S3_ENDPOINT=http://localhost:9000 \
//! TEST_S3_ACCESS_KEY=accesskey \
//! TEST_S3_SECRET_KEY=secretkey \
//!     cargo test --features integration
//! ```

#![cfg(feature = "integration")]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use tempfile::TempDir;

fn osc_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_osc"))
}

fn run_osc(args: &[&str], config_dir: &Path) -> Output {
    Command::new(osc_binary())
        .args(args)
        .env("OSC_CONFIG_DIR", config_dir)
        .output()
        .expect("Failed to execute osc command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("Expected JSON output")
}

fn get_test_config() -> Option<(String, String, String)> {
    let endpoint = std::env::var("TEST_S3_ENDPOINT").ok()?;
    let access_key = std::env::var("TEST_S3_ACCESS_KEY").ok()?;
    let secret_key = std::env::var("TEST_S3_SECRET_KEY").ok()?;
    Some((endpoint, access_key, secret_key))
}

fn unique_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{:x}", duration.as_nanos() % 0xFFFFFFFF)
}

/// Wait for the server to answer bucket listings
fn wait_for_s3_ready(config_dir: &Path) -> bool {
    for _ in 0..30 {
        if run_osc(&["ls", "test/", "--json"], config_dir).status.success() {
            return true;
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    false
}

/// Configure the `test` alias and create a fresh bucket
fn setup_with_bucket(name: &str) -> Option<(TempDir, String)> {
    let (endpoint, access_key, secret_key) = get_test_config()?;
    let config_dir = tempfile::tempdir().ok()?;

    let output = run_osc(
        &[
            "alias",
            "set",
            "test",
            &endpoint,
            &access_key,
            &secret_key,
            "--bucket-lookup",
            "path",
        ],
        config_dir.path(),
    );
    if !output.status.success() {
        eprintln!("Failed to set alias: {}", String::from_utf8_lossy(&output.stderr));
        return None;
    }
    if !wait_for_s3_ready(config_dir.path()) {
        eprintln!("S3 service did not become ready in time");
        return None;
    }

    let bucket = format!("osc-{name}-{}", unique_suffix());
    let output = run_osc(&["mb", &format!("test/{bucket}")], config_dir.path());
    if !output.status.success() {
        eprintln!("Failed to create bucket: {}", String::from_utf8_lossy(&output.stderr));
        return None;
    }
    Some((config_dir, bucket))
}

fn cleanup_bucket(config_dir: &Path, bucket: &str) {
    let _ = run_osc(&["rb", "--force", &format!("test/{bucket}")], config_dir);
}

macro_rules! require_server {
    ($name:expr) => {
        match setup_with_bucket($name) {
            Some(setup) => setup,
            None => {
                eprintln!("Skipping: S3 test config not available");
                return;
            }
        }
    };
}

mod bucket_operations {
    use super::*;

    #[test]
    fn test_create_list_and_remove_bucket() {
        let (config_dir, bucket) = require_server!("bucket");

        let output = run_osc(&["ls", "test/", "--json"], config_dir.path());
        assert!(output.status.success());
        assert!(stdout(&output).contains(&bucket), "Bucket not found in listing");

        let output = run_osc(
            &["mb", "--ignore-existing", &format!("test/{bucket}"), "--json"],
            config_dir.path(),
        );
        assert!(output.status.success());
        assert_eq!(json(&output)["status"], "exists");

        let output = run_osc(&["stat", &format!("test/{bucket}"), "--json"], config_dir.path());
        assert!(output.status.success());
        assert_eq!(json(&output)["exists"], true);

        let output = run_osc(&["rb", &format!("test/{bucket}"), "--json"], config_dir.path());
        assert!(
            output.status.success(),
            "Failed to remove bucket: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let output = run_osc(&["ls", "test/", "--json"], config_dir.path());
        assert!(!stdout(&output).contains(&bucket), "Bucket still listed after rb");
    }

    #[test]
    fn test_create_existing_bucket_is_conflict() {
        let (config_dir, bucket) = require_server!("conflict");

        let output = run_osc(&["mb", &format!("test/{bucket}")], config_dir.path());
        assert!(!output.status.success());

        cleanup_bucket(config_dir.path(), &bucket);
    }

    #[test]
    fn test_remove_non_empty_bucket_requires_force() {
        let (config_dir, bucket) = require_server!("force");
        let local = config_dir.path().join("data.txt");
        std::fs::write(&local, b"payload").unwrap();

        let target = format!("test/{bucket}/data.txt");
        assert!(run_osc(&["put", local.to_str().unwrap(), &target], config_dir.path()).status.success());

        let output = run_osc(&["rb", &format!("test/{bucket}")], config_dir.path());
        assert!(!output.status.success(), "rb should refuse a non-empty bucket");

        let output = run_osc(&["rb", "--force", &format!("test/{bucket}"), "--json"], config_dir.path());
        assert!(output.status.success());
        assert_eq!(json(&output)["objects_removed"], 1);
    }
}

mod object_operations {
    use super::*;

    #[test]
    fn test_put_stat_get_cat_rm() {
        let (config_dir, bucket) = require_server!("object");
        let content = b"Hello from osc integration tests\n";
        let local = config_dir.path().join("hello.txt");
        std::fs::write(&local, content).unwrap();
        let remote = format!("test/{bucket}/docs/hello.txt");

        let output = run_osc(&["put", local.to_str().unwrap(), &remote, "--json"], config_dir.path());
        assert!(
            output.status.success(),
            "Failed to upload: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(json(&output)["etag"].is_string());

        let output = run_osc(&["stat", &remote, "--json"], config_dir.path());
        assert!(output.status.success());
        let stat = json(&output);
        assert_eq!(stat["size"], content.len() as u64);
        assert_eq!(stat["content_type"], "text/plain");

        let output = run_osc(&["ls", &format!("test/{bucket}/docs/"), "--json"], config_dir.path());
        assert!(output.status.success());
        let listing = json(&output);
        let keys: Vec<&str> = listing["items"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|item| item["key"].as_str())
            .collect();
        assert_eq!(keys, vec!["docs/hello.txt"]);

        let download = config_dir.path().join("download.txt");
        let output = run_osc(&["get", &remote, download.to_str().unwrap()], config_dir.path());
        assert!(output.status.success());
        assert_eq!(std::fs::read(&download).unwrap(), content);

        let output = run_osc(&["cat", &remote], config_dir.path());
        assert!(output.status.success());
        assert_eq!(output.stdout, content);

        let output = run_osc(&["cat", "--offset", "6", "--length", "4", &remote], config_dir.path());
        assert!(output.status.success());
        assert_eq!(output.stdout, b"from");

        let output = run_osc(&["rm", &remote], config_dir.path());
        assert!(output.status.success());

        let output = run_osc(&["stat", &remote], config_dir.path());
        assert_eq!(output.status.code(), Some(5), "Expected not-found exit code");

        cleanup_bucket(config_dir.path(), &bucket);
    }

    #[test]
    fn test_multipart_upload_round_trip() {
        let (config_dir, bucket) = require_server!("multipart");
        let content: Vec<u8> = (0..12 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        let local = config_dir.path().join("large.bin");
        std::fs::write(&local, &content).unwrap();
        let remote = format!("test/{bucket}/large.bin");

        let output = run_osc(
            &["put", "--part-size", "5MiB", "--parallel", "3", local.to_str().unwrap(), &remote],
            config_dir.path(),
        );
        assert!(
            output.status.success(),
            "Failed multipart upload: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let output = run_osc(&["stat", &remote, "--json"], config_dir.path());
        let stat = json(&output);
        assert_eq!(stat["size"], content.len() as u64);
        assert!(stat["etag"].as_str().unwrap().ends_with("-3"));

        let download = config_dir.path().join("large.out");
        let output = run_osc(&["get", &remote, download.to_str().unwrap()], config_dir.path());
        assert!(output.status.success());
        assert_eq!(std::fs::read(&download).unwrap(), content);

        cleanup_bucket(config_dir.path(), &bucket);
    }

    #[test]
    fn test_recursive_remove() {
        let (config_dir, bucket) = require_server!("recursive");
        let local = config_dir.path().join("item.txt");
        std::fs::write(&local, b"item").unwrap();
        for key in ["logs/a.txt", "logs/b.txt", "keep.txt"] {
            let target = format!("test/{bucket}/{key}");
            assert!(run_osc(&["put", local.to_str().unwrap(), &target], config_dir.path()).status.success());
        }

        let output = run_osc(
            &["rm", "--recursive", "--dry-run", &format!("test/{bucket}/logs/")],
            config_dir.path(),
        );
        assert!(output.status.success());

        let output = run_osc(&["rm", "--recursive", &format!("test/{bucket}/logs/")], config_dir.path());
        assert!(output.status.success());

        let output = run_osc(&["ls", "--recursive", &format!("test/{bucket}/"), "--json"], config_dir.path());
        let listing = stdout(&output);
        assert!(listing.contains("keep.txt"));
        assert!(!listing.contains("logs/a.txt"));

        cleanup_bucket(config_dir.path(), &bucket);
    }
}

mod presign_operations {
    use super::*;

    #[test]
    fn test_presign_get_url() {
        let (config_dir, bucket) = require_server!("presign");
        let local = config_dir.path().join("shared.txt");
        std::fs::write(&local, b"shared").unwrap();
        let remote = format!("test/{bucket}/shared.txt");
        assert!(run_osc(&["put", local.to_str().unwrap(), &remote], config_dir.path()).status.success());

        let output = run_osc(&["presign", "--expire", "1h", &remote, "--json"], config_dir.path());
        assert!(output.status.success());
        let presigned = json(&output);
        assert_eq!(presigned["method"], "GET");
        assert_eq!(presigned["expires_seconds"], 3600);
        let url = presigned["url"].as_str().unwrap();
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=3600"));

        let output = run_osc(&["presign", "--expire", "8d", &remote], config_dir.path());
        assert!(!output.status.success(), "Expiry over 7 days should be rejected");

        cleanup_bucket(config_dir.path(), &bucket);
    }
}
