//! Command definitions and dispatch
//!
//! Each command is a thin wrapper over one or two `S3Client` operations.

use clap::{Parser, Subcommand};
use osc_core::{AliasManager, ConfigManager, Error, RemotePath, Result};
use osc_s3::S3Client;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod alias;
mod cat;
mod get;
mod ls;
mod mb;
mod presign;
mod put;
mod rb;
mod rm;
mod stat;

/// osc - client for S3-compatible object storage
#[derive(Parser, Debug)]
#[command(name = "osc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log every request and response
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage storage service aliases
    #[command(subcommand)]
    Alias(alias::AliasCommands),

    /// List buckets, objects or incomplete uploads
    Ls(ls::LsArgs),

    /// Create a bucket
    Mb(mb::MbArgs),

    /// Remove a bucket
    Rb(rb::RbArgs),

    /// Upload a file or stdin
    Put(put::PutArgs),

    /// Download an object to a file
    Get(get::GetArgs),

    /// Write object contents to stdout
    Cat(cat::CatArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// Remove objects or incomplete uploads
    Rm(rm::RmArgs),

    /// Generate a presigned URL
    Presign(presign::PresignArgs),
}

/// Run `cli` and return its exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let defaults = ConfigManager::new()
        .and_then(|manager| manager.load())
        .map(|config| config.defaults)
        .unwrap_or_default();
    let output_config = OutputConfig {
        json: cli.json || defaults.output == "json",
        no_color: cli.no_color || defaults.color == "never",
        no_progress: cli.no_progress || !defaults.progress,
        quiet: cli.quiet,
    };

    let run = async move {
        match cli.command {
            Commands::Alias(cmd) => alias::execute(cmd, output_config).await,
            Commands::Ls(args) => ls::execute(args, output_config).await,
            Commands::Mb(args) => mb::execute(args, output_config).await,
            Commands::Rb(args) => rb::execute(args, output_config).await,
            Commands::Put(args) => put::execute(args, output_config, &defaults).await,
            Commands::Get(args) => get::execute(args, output_config).await,
            Commands::Cat(args) => cat::execute(args, output_config).await,
            Commands::Stat(args) => stat::execute(args, output_config).await,
            Commands::Rm(args) => rm::execute(args, output_config).await,
            Commands::Presign(args) => presign::execute(args, output_config).await,
        }
    };

    tokio::select! {
        code = run => code,
        _ = tokio::signal::ctrl_c() => ExitCode::Interrupted,
    }
}

/// Client for the alias named by `path`
pub(crate) fn connect(path: &RemotePath) -> Result<S3Client> {
    let alias = AliasManager::new()?.get(&path.alias)?;
    let client = S3Client::from_alias(&alias)?;
    client.set_app_info("osc", env!("CARGO_PKG_VERSION"))?;
    Ok(client)
}

/// Report `err` and map it to an exit code
pub(crate) fn fail(formatter: &Formatter, context: &str, err: &Error) -> ExitCode {
    formatter.failure(context, err);
    ExitCode::from(err)
}

/// Parse a remote path, reporting a usage error on failure
pub(crate) fn remote_arg(formatter: &Formatter, path: &str) -> std::result::Result<RemotePath, ExitCode> {
    osc_core::parse_remote(path.trim_end_matches('/'))
        .map(|mut remote| {
            // Keep a trailing slash on object prefixes
            if path.ends_with('/') {
                if let Some(object) = remote.object.as_mut() {
                    object.push('/');
                }
            }
            remote
        })
        .map_err(|e| fail(formatter, "Invalid path", &e))
}
