#![deny(missing_docs)]

//! # RestPlus CLI
//!
//! Command Line Interface for the API documentation compiler.
//!
//! Supported Commands:
//! - `compile`: Definition file -> Swagger 2.0 document.
//! - `endpoints`: Lists endpoint names and URLs of a definition.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::error::CliResult;

mod compile;
mod endpoints;
mod error;

#[derive(Parser, Debug)]
#[clap(author, version, about = "RestPlus documentation compiler")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compiles a definition file into a Swagger document.
    Compile(compile::CompileArgs),
    /// Lists the endpoints declared by a definition file.
    Endpoints(endpoints::EndpointsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Compile(args) => compile::execute(args)?,
        Commands::Endpoints(args) => endpoints::execute(args)?,
    }

    Ok(())
}
