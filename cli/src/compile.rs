#![deny(missing_docs)]

//! # Compile Command
//!
//! Loads a definition file and writes the compiled Swagger document.

use crate::error::{CliError, CliResult};
use clap::ValueEnum;
use restplus_core::load_api;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Output serialization.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

/// Arguments for the compile command.
#[derive(clap::Args, Debug, Clone)]
pub struct CompileArgs {
    /// API definition file (YAML, or JSON with a `.json` extension).
    #[clap(long, short, env = "RESTPLUS_DEFINITION")]
    pub input: PathBuf,

    /// Destination file. Prints to stdout when omitted.
    #[clap(long, short)]
    pub output: Option<PathBuf>,

    /// Include internal namespaces and resources.
    #[clap(long)]
    pub internal: bool,

    /// Output format.
    #[clap(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

/// Renders `doc` in the requested format.
pub fn render(doc: &Value, format: OutputFormat) -> CliResult<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(doc)?,
        OutputFormat::Yaml => serde_yaml::to_string(doc)?,
    })
}

/// Executes the compile command.
pub fn execute(args: &CompileArgs) -> CliResult<()> {
    if !args.input.exists() {
        return Err(CliError::General(format!(
            "Definition file not found: {:?}",
            args.input
        )));
    }

    let mut api = load_api(&args.input)?;
    let doc = api.schema(args.internal)?;
    let rendered = render(&doc, args.format)?;

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, rendered)?;
            tracing::info!(output = %path.display(), internal = args.internal, "wrote swagger document");
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
