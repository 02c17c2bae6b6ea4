//! osc - command-line client for S3-compatible object storage

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use osc_cli::commands::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("osc_s3=debug,osc_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = commands::execute(cli).await;
    std::process::exit(exit_code.as_i32());
}
