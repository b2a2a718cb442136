//! Kiln is a registry-driven project scaffolding toolkit.
//! It resolves answers to a template's questions into a substitution context,
//! renders the template tree into a destination directory and runs the
//! template's pre and post generation hooks around it.

/// Command-line interface module for the Kiln application
pub mod cli;

/// Configuration handling for Kiln templates
/// Supports JSON and YAML formats (kiln.json, kiln.yml, kiln.yaml)
pub mod config;

pub mod constants;

/// Substitution context built from resolved answers
pub mod context;

/// Error types and handling for the Kiln application
pub mod error;

/// Generation orchestrator and its state machine
pub mod generator;

/// Pre and post generation hooks
/// Built-in hooks plus scripts found in:
/// - hooks/pre_gen_project
/// - hooks/post_gen_project
pub mod hooks;

/// File and directory ignore patterns
/// Processes .kilnignore files to exclude specific paths
pub mod ignore;

pub mod logger;

/// Render planning and materialization of template trees
pub mod processor;

/// Answer providers, interactive and prepared
pub mod prompt;

pub mod question;

/// Template registry with lookup by name and group
pub mod registry;

/// MiniJinja-backed rendering of names, contents and conditions
pub mod renderer;

pub mod resolver;

/// Conditional inclusion rules
pub mod rules;

pub mod template;
