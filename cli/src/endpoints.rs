#![deny(missing_docs)]

//! # Endpoints Command
//!
//! Lists the endpoint name and URL of every registered resource.

use crate::error::CliResult;
use restplus_core::{load_api, Api};
use std::path::PathBuf;

/// Arguments for the endpoints command.
#[derive(clap::Args, Debug, Clone)]
pub struct EndpointsArgs {
    /// API definition file.
    #[clap(long, short, env = "RESTPLUS_DEFINITION")]
    pub input: PathBuf,
}

/// One `endpoint<TAB>url` line per resource, the swagger document last.
pub fn listing(api: &Api) -> String {
    api.endpoints()
        .into_iter()
        .map(|(endpoint, url)| format!("{}\t{}", endpoint, url))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Executes the endpoints command.
pub fn execute(args: &EndpointsArgs) -> CliResult<()> {
    let api = load_api(&args.input)?;
    println!("{}", listing(&api));
    Ok(())
}
