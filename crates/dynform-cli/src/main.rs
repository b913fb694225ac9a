//! dynform CLI - Drive configuration forms from the command line
//!
//! Loads descriptor files, applies edits and resolves dependent dropdowns
//! against a lookup endpoint or a local options table.

mod cli;
mod commands;
mod error;
mod profiles;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::config::run_config;
use crate::commands::inspect::run_inspect;
use crate::commands::resolve::{run_resolve, ResolveArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dynform=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { descriptors, json } => run_inspect(&descriptors, json)?,
        Commands::Resolve {
            descriptors,
            set,
            add,
            remove,
            options,
            credentials,
            step,
            component,
            json,
        } => {
            let args = ResolveArgs {
                descriptors,
                assignments: set,
                add,
                remove,
                options,
                credentials,
                step,
                component,
                json,
            };
            run_resolve(args, cli.profile.as_deref()).await?;
        }
        Commands::Config { command } => run_config(command, cli.profile.as_deref())?,
    }

    Ok(())
}
