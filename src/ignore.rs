//! File and directory ignore pattern handling for Kiln templates.
//! This module processes .kilnignore files to exclude specific paths
//! from template processing, similar to .gitignore functionality.

use globset::{Glob, GlobSet, GlobSetBuilder};
use log::debug;
use std::path::Path;

pub use crate::constants::{DEFAULT_IGNORE_PATTERNS, IGNORE_FILE};
use crate::error::{Error, Result};

/// Reads the .kilnignore file in `template_root` and merges it with the default patterns.
///
/// # Notes
/// - A missing .kilnignore yields the default patterns only
/// - Each non-blank line not starting with `#` is a glob pattern
/// - Patterns match paths relative to the template root
///
/// # Example
/// ```ignore
/// # Contents of .kilnignore:
/// *.pyc
/// __pycache__
/// ```
pub fn parse_kilnignore_file<P: AsRef<Path>>(template_root: P) -> Result<GlobSet> {
    let ignore_path = template_root.as_ref().join(IGNORE_FILE);
    let mut builder = GlobSetBuilder::new();

    for pattern in DEFAULT_IGNORE_PATTERNS {
        builder.add(Glob::new(pattern)?);
    }

    if ignore_path.exists() {
        let contents = std::fs::read_to_string(&ignore_path)?;
        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.trim_end_matches('/');
            builder.add(Glob::new(line).map_err(|e| Error::ConfigError {
                path: ignore_path.clone(),
                reason: e.to_string(),
            })?);
        }
    } else {
        debug!("No {IGNORE_FILE} in {}", template_root.as_ref().display());
    }

    Ok(builder.build()?)
}
