//! cat command - Write object contents to stdout

use clap::Args;
use futures::TryStreamExt;
use osc_core::{Error, Result};
use osc_s3::{GetObjectOptions, S3Client};
use tokio::io::AsyncWriteExt;

use super::{connect, fail, remote_arg};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct CatArgs {
    /// Object path (alias/bucket/key)
    pub path: String,

    /// Start at this byte offset
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Number of bytes to print; the rest of the object when omitted
    #[arg(long)]
    pub length: Option<u64>,

    /// Print a specific version
    #[arg(long)]
    pub version_id: Option<String>,
}

async fn stream_to_stdout(client: &S3Client, bucket: &str, object: &str, options: &GetObjectOptions) -> Result<u64> {
    let response = client.get_object(bucket, object, options).await?;
    let mut body = response.body.into_stream();
    let mut stdout = tokio::io::stdout();
    let mut written = 0u64;
    while let Some(chunk) = body.try_next().await? {
        stdout.write_all(&chunk).await.map_err(Error::Io)?;
        written += chunk.len() as u64;
    }
    stdout.flush().await?;
    Ok(written)
}

pub async fn execute(args: CatArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let path = match remote_arg(&formatter, &args.path) {
        Ok(path) => path,
        Err(code) => return code,
    };
    let (bucket, object) = match path.require_object() {
        Ok(names) => names,
        Err(e) => return fail(&formatter, "Invalid path", &e),
    };
    let client = match connect(&path) {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };

    let options = GetObjectOptions {
        offset: args.offset,
        length: args.length,
        version_id: args.version_id.clone(),
        ..Default::default()
    };
    match stream_to_stdout(&client, bucket, object, &options).await {
        Ok(written) => {
            tracing::debug!(bytes = written, "object written to stdout");
            ExitCode::Success
        }
        Err(e) => fail(&formatter, &format!("Failed to read '{path}'"), &e),
    }
}
