//! Common constants used throughout Kiln.

/// Supported template configuration file names, in lookup order.
pub const CONFIG_FILES: [&str; 3] = ["kiln.yaml", "kiln.yml", "kiln.json"];

/// Kiln's ignore file name.
pub const IGNORE_FILE: &str = ".kilnignore";

/// Suffix marking files whose contents are rendered.
pub const TEMPLATE_SUFFIX: &str = ".j2";

/// Directory holding hook scripts inside a template.
pub const HOOKS_DIR: &str = "hooks";

/// Patterns that are never copied into a generated project.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    ".git/**",
    ".hg",
    ".hg/**",
    ".svn",
    ".svn/**",
    "**/.DS_Store",
    ".kilnignore",
    "kiln.yaml",
    "kiln.yml",
    "kiln.json",
    "hooks",
    "hooks/**",
];
