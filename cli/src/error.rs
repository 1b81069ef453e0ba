#![deny(missing_docs)]

//! # CLI Errors
//!
//! Error types for the CLI crate.

use derive_more::{Display, From};
use restplus_core::AppError;

/// Main error enum for CLI operations.
#[derive(Debug, Display, From)]
pub enum CliError {
    /// Loading or compiling the definition failed.
    #[display("{}", _0)]
    Core(AppError),

    /// IO Error wrapper.
    #[display("IO Error: {}", _0)]
    Io(std::io::Error),

    /// Rendering the document failed.
    #[display("Output Error: {}", _0)]
    Json(serde_json::Error),

    /// Rendering the document as YAML failed.
    #[display("Output Error: {}", _0)]
    Yaml(serde_yaml::Error),

    /// General failure message.
    #[display("Operation failed: {}", _0)]
    General(String),
}

/// Manual implementation of the standard Error trait.
///
/// `General(String)` carries no source error, so `derive(Error)` is not used.
impl std::error::Error for CliError {}

/// Result type alias.
pub type CliResult<T> = Result<T, CliError>;
