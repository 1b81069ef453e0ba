//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the workspace.

use derive_more::{Display, From};

/// The Global Error Enum.
///
/// The first four variants are the failure kinds of the documentation layer.
/// String payloads never convert implicitly; `From<String>` targets `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// Inconsistent registration: malformed route URL, fixed path conflict,
    /// mask naming an unknown field.
    #[from(ignore)]
    #[display("Configuration Error: {_0}")]
    Configuration(String),

    /// A security requirement names a scheme missing from the Api authorizations.
    #[from(ignore)]
    #[display("Security Error: {_0}")]
    Security(String),

    /// The Swagger document cannot be built (unregistered model, ambiguous ancestor).
    #[from(ignore)]
    #[display("Specs Error: {_0}")]
    Specs(String),

    /// A value cannot be coerced into its field type.
    #[from(ignore)]
    #[display("Marshalling Error: {_0}")]
    Marshalling(String),

    /// A request value rejected by a validation descriptor.
    #[from(ignore)]
    #[display("Validation Error: {_0}")]
    Validation(String),

    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// Wrapper for JSON (de)serialization errors.
    #[display("JSON Error: {_0}")]
    Json(serde_json::Error),

    /// Wrapper for YAML (de)serialization errors.
    #[display("YAML Error: {_0}")]
    Yaml(serde_yaml::Error),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;
