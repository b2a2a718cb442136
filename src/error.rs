//! Error handling for Kiln.
//! Defines the error type and result alias shared by every stage of a generation run.

use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for Kiln operations.
///
/// Resolution and pre-hook errors happen before the destination is touched.
/// Render and post-hook errors may leave partial output behind.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Template '{name}' is already registered.")]
    DuplicateTemplate { name: String },

    #[error("Template '{name}' is not registered.")]
    UnknownTemplate { name: String },

    #[error("Template '{name}' is invalid: {reason}.")]
    InvalidTemplate { name: String, reason: String },

    /// The answer is not one of the declared choices or was rejected by a validator.
    #[error("Invalid answer for '{key}': {reason}.")]
    InvalidAnswer { key: String, reason: String },

    /// A template references a variable that is not part of the context.
    #[error("Undefined variable '{key}' referenced in {location}.")]
    MissingContextKey { key: String, location: String },

    #[error("Pre-generation hook '{hook}' rejected the context: {reason}.")]
    PreHookValidation { hook: String, reason: String },

    #[error("Failed to write '{}': {source}.", path.display())]
    RenderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Post-generation hook '{hook}' failed: {reason}.")]
    PostHook { hook: String, reason: String },

    #[error(
        "Both '{}' and '{}' render to '{}'.",
        first.display(),
        second.display(),
        destination.display()
    )]
    DestinationConflict { destination: PathBuf, first: PathBuf, second: PathBuf },

    #[error("Output directory '{}' already exists and is not empty. Use --force to overwrite.", path.display())]
    DestinationExists { path: PathBuf },

    #[error("Rendered path '{rendered}' (from '{source_path}') is not a valid relative path.")]
    InvalidPath { source_path: String, rendered: String },

    /// Template syntax or evaluation problems other than undefined variables.
    #[error("Template error in {location}: {reason}.")]
    Template { location: String, reason: String },

    #[error("Configuration error in '{}': {reason}.", path.display())]
    ConfigError { path: PathBuf, reason: String },

    #[error("IO error: {0}.")]
    IoError(#[from] std::io::Error),

    #[error("MiniJinja error: {0}.")]
    MinijinjaError(#[from] minijinja::Error),

    #[error("Glob set error: {0}.")]
    GlobSetError(#[from] globset::Error),

    #[error("Directory walk error: {0}.")]
    WalkdirError(#[from] walkdir::Error),

    #[error("Regex error: {0}.")]
    RegexError(#[from] regex::Error),

    #[error("JSON error: {0}.")]
    JSONParseError(#[from] serde_json::Error),

    #[error("YAML error: {0}.")]
    YAMLParseError(#[from] serde_yaml::Error),
}

/// Convenience type alias for Results with Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{err}");
    std::process::exit(1);
}
