use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::PolicyArgs;

#[derive(Parser, Debug)]
#[command(name = "tessera", version, about = "Tessera CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a request payload against its policy and print the result.
    Check {
        #[command(flatten)]
        policy: PolicyArgs,

        /// Request payload (JSON file)
        #[arg(long)]
        request: PathBuf,
    },

    /// Shape a response payload with its policy and print the result.
    Shape {
        #[command(flatten)]
        policy: PolicyArgs,

        /// Response payload (JSON file)
        #[arg(long)]
        response: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Check { policy, request } => commands::check::run(&policy, &request).await?,
        Command::Shape { policy, response } => commands::shape::run(&policy, &response).await?,
    }

    Ok(())
}
