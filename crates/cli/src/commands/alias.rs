//! Alias management commands
//!
//! An alias names an endpoint together with its credentials and addressing
//! settings. Aliases live in the config file.

use clap::Subcommand;
use osc_core::{Alias, AliasManager, BucketLookup, Error};
use serde::Serialize;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum AliasCommands {
    /// Add or update an alias
    Set(SetArgs),

    /// List configured aliases
    List(ListArgs),

    /// Remove an alias
    Remove(RemoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Alias name (e.g. "local", "s3", "play")
    pub name: String,

    /// Endpoint URL (e.g. "http://localhost:9000", "https://s3.amazonaws.com")
    pub endpoint: String,

    /// Access key; leave empty for anonymous access
    #[arg(default_value = "")]
    pub access_key: String,

    #[arg(default_value = "")]
    pub secret_key: String,

    /// Session token for temporary credentials
    #[arg(long, env = "OSC_SESSION_TOKEN")]
    pub session_token: Option<String>,

    /// Fix the region instead of asking the server per bucket
    #[arg(long)]
    pub region: Option<String>,

    /// Bucket lookup style: auto, path, or dns
    #[arg(long, default_value = "auto")]
    pub bucket_lookup: String,

    /// Use the S3 transfer acceleration endpoint
    #[arg(long)]
    pub accelerate: bool,

    /// Use the dual-stack (IPv6) endpoint
    #[arg(long)]
    pub dualstack: bool,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// PEM bundle with additional trusted CAs
    #[arg(long)]
    pub ca_bundle: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show region and addressing details
    #[arg(short, long)]
    pub long: bool,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    pub name: String,
}

/// Alias as printed; never includes the secret
#[derive(Debug, Serialize)]
struct AliasInfo {
    name: String,
    endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    bucket_lookup: BucketLookup,
    anonymous: bool,
}

impl From<&Alias> for AliasInfo {
    fn from(alias: &Alias) -> Self {
        Self {
            name: alias.name.clone(),
            endpoint: alias.endpoint.clone(),
            region: alias.region.clone(),
            bucket_lookup: alias.bucket_lookup,
            anonymous: alias.is_anonymous(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AliasOperationOutput {
    alias: String,
    status: &'static str,
}

pub async fn execute(cmd: AliasCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match AliasManager::new() {
        Ok(manager) => manager,
        Err(e) => return fail(&formatter, "Failed to load aliases", &e),
    };

    match cmd {
        AliasCommands::Set(args) => execute_set(args, &manager, &formatter),
        AliasCommands::List(args) => execute_list(args, &manager, &formatter),
        AliasCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    }
}

fn build_alias(args: SetArgs) -> Result<Alias, Error> {
    let mut alias = Alias::new(args.name, args.endpoint, args.access_key, args.secret_key);
    alias.session_token = args.session_token;
    alias.region = args.region;
    alias.bucket_lookup = args.bucket_lookup.parse()?;
    alias.accelerate = args.accelerate;
    alias.dualstack = args.dualstack;
    alias.insecure = args.insecure;
    alias.ca_bundle = args.ca_bundle;
    Ok(alias)
}

fn execute_set(args: SetArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    let name = args.name.clone();
    let result = build_alias(args).and_then(|alias| manager.set(alias));
    match result {
        Ok(replaced) => {
            let status = if replaced { "updated" } else { "added" };
            formatter.output(
                &AliasOperationOutput {
                    alias: name.clone(),
                    status,
                },
                |_| format!("Alias '{name}' {status}."),
            );
            ExitCode::Success
        }
        Err(e) => fail(formatter, "Failed to set alias", &e),
    }
}

fn execute_list(args: ListArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    let aliases = match manager.list() {
        Ok(aliases) => aliases,
        Err(e) => return fail(formatter, "Failed to list aliases", &e),
    };
    let infos: Vec<AliasInfo> = aliases.iter().map(AliasInfo::from).collect();

    formatter.output(&infos, |infos| {
        if infos.is_empty() {
            return "No aliases configured.".to_string();
        }
        infos
            .iter()
            .map(|info| {
                if args.long {
                    format!(
                        "{:<12} {} (region: {}, lookup: {:?}{})",
                        info.name,
                        info.endpoint,
                        info.region.as_deref().unwrap_or("auto"),
                        info.bucket_lookup,
                        if info.anonymous { ", anonymous" } else { "" }
                    )
                } else {
                    format!("{:<12} {}", info.name, info.endpoint)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    });
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            formatter.output(
                &AliasOperationOutput {
                    alias: args.name.clone(),
                    status: "removed",
                },
                |_| format!("Alias '{}' removed.", args.name),
            );
            ExitCode::Success
        }
        Err(e) => fail(formatter, "Failed to remove alias", &e),
    }
}
