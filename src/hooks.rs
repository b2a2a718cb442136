//! Pre and post generation hooks.
//!
//! A pre hook sees the resolved context before anything is written and may
//! reject or normalize it. A post hook runs against the generated tree.
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use globset::{Glob, GlobSet, GlobSetBuilder};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::question::is_identifier;
use crate::rules::{all_hold, Condition};

/// What to do when an external command started by a post hook fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and report it as a warning. Generation still succeeds.
    Warn,
    /// Fail the generation at the post-hook stage.
    #[default]
    Abort,
}

pub trait PreHook: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the (possibly normalized) context or rejects it.
    fn run(&self, context: Context) -> Result<Context>;

    /// True for hooks that start external processes.
    fn runs_external_command(&self) -> bool {
        false
    }
}

pub trait PostHook: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, destination_root: &Path, context: &Context) -> Result<()>;

    /// True for hooks that start external processes.
    fn runs_external_command(&self) -> bool {
        false
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Abort
    }
}

/// Adapts a closure to either hook trait.
pub struct FnHook<F> {
    name: String,
    f: F,
}

pub fn pre_hook<N, F>(name: N, f: F) -> FnHook<F>
where
    N: Into<String>,
    F: Fn(Context) -> anyhow::Result<Context> + Send + Sync,
{
    FnHook { name: name.into(), f }
}

pub fn post_hook<N, F>(name: N, f: F) -> FnHook<F>
where
    N: Into<String>,
    F: Fn(&Path, &Context) -> anyhow::Result<()> + Send + Sync,
{
    FnHook { name: name.into(), f }
}

impl<F> PreHook for FnHook<F>
where
    F: Fn(Context) -> anyhow::Result<Context> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, context: Context) -> Result<Context> {
        (self.f)(context).map_err(|e| Error::PreHookValidation {
            hook: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

impl<F> PostHook for FnHook<F>
where
    F: Fn(&Path, &Context) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, destination_root: &Path, context: &Context) -> Result<()> {
        (self.f)(destination_root, context)
            .map_err(|e| Error::PostHook { hook: self.name.clone(), reason: e.to_string() })
    }
}

/// Rejects the context unless every listed key holds a valid identifier.
#[derive(Debug, Clone)]
pub struct IdentifierCheck {
    pub keys: Vec<String>,
}

impl PreHook for IdentifierCheck {
    fn name(&self) -> &str {
        "identifier_check"
    }

    fn run(&self, context: Context) -> Result<Context> {
        for key in &self.keys {
            let value = context.get_str(key).map_err(|e| self.reject(e.to_string()))?;
            if !is_identifier(value) {
                return Err(self.reject(format!("'{value}' ({key}) is not a valid identifier")));
            }
        }
        Ok(context)
    }
}

impl IdentifierCheck {
    fn reject(&self, reason: String) -> Error {
        Error::PreHookValidation { hook: self.name().to_string(), reason }
    }
}

/// Rejects answer combinations that cannot be generated together.
#[derive(Debug, Clone)]
pub struct RejectWhen {
    pub when: Vec<Condition>,
    pub message: String,
}

impl PreHook for RejectWhen {
    fn name(&self) -> &str {
        "reject_when"
    }

    fn run(&self, context: Context) -> Result<Context> {
        if all_hold(&self.when, &context)? {
            return Err(Error::PreHookValidation {
                hook: self.name().to_string(),
                reason: self.message.clone(),
            });
        }
        Ok(context)
    }
}

/// Deletes generated paths made irrelevant by the answers.
#[derive(Debug, Clone)]
pub struct RemovePaths {
    pub when: Vec<Condition>,
    pub paths: Vec<String>,
}

impl PostHook for RemovePaths {
    fn name(&self) -> &str {
        "remove_paths"
    }

    fn run(&self, destination_root: &Path, context: &Context) -> Result<()> {
        if !all_hold(&self.when, context)? {
            return Ok(());
        }
        for relative in &self.paths {
            let path = contained_path(destination_root, relative).ok_or_else(|| Error::PostHook {
                hook: self.name().to_string(),
                reason: format!("'{relative}' is not a relative path inside the output"),
            })?;
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else if path.exists() {
                std::fs::remove_file(&path)
            } else {
                continue;
            };
            removed.map_err(|source| Error::RenderIo { path: path.clone(), source })?;
            info!("Removed '{}'", path.display());
        }
        Ok(())
    }
}

fn contained_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative.trim_end_matches('/'));
    let safe = relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    (safe && !relative.as_os_str().is_empty()).then(|| root.join(relative))
}

/// Sets the user-executable bit on generated files matching the patterns.
#[derive(Debug, Clone)]
pub struct MakeExecutable {
    patterns: GlobSet,
}

impl MakeExecutable {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern.as_ref())?);
        }
        Ok(Self { patterns: builder.build()? })
    }
}

impl PostHook for MakeExecutable {
    fn name(&self) -> &str {
        "make_executable"
    }

    fn run(&self, destination_root: &Path, _context: &Context) -> Result<()> {
        for entry in WalkDir::new(destination_root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(destination_root).unwrap_or(entry.path());
            if self.patterns.is_match(relative) {
                set_user_executable(entry.path())?;
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn set_user_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o100);
    std::fs::set_permissions(path, permissions)
        .map_err(|source| Error::RenderIo { path: path.to_path_buf(), source })?;
    debug!("Made '{}' executable", path.display());
    Ok(())
}

#[cfg(not(unix))]
fn set_user_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Removes directories left empty by pruning or cleanup.
#[derive(Debug, Clone, Default)]
pub struct RemoveEmptyDirs;

impl PostHook for RemoveEmptyDirs {
    fn name(&self) -> &str {
        "remove_empty_dirs"
    }

    fn run(&self, destination_root: &Path, _context: &Context) -> Result<()> {
        for entry in WalkDir::new(destination_root).min_depth(1).contents_first(true) {
            let entry = entry?;
            if entry.file_type().is_dir() && std::fs::read_dir(entry.path())?.next().is_none() {
                std::fs::remove_dir(entry.path())
                    .map_err(|source| Error::RenderIo { path: entry.path().to_path_buf(), source })?;
                debug!("Removed empty directory '{}'", entry.path().display());
            }
        }
        Ok(())
    }
}

/// Runs an external command inside the generated project.
#[derive(Debug, Clone)]
pub struct CommandHook {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub on_failure: FailurePolicy,
}

impl CommandHook {
    pub fn new<P: Into<String>>(program: P, args: Vec<String>) -> Self {
        let program = program.into();
        Self { name: program.clone(), program, args, on_failure: FailurePolicy::default() }
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }
}

impl PostHook for CommandHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, destination_root: &Path, _context: &Context) -> Result<()> {
        info!("Running '{} {}'", self.program, self.args.join(" "));
        let status = Command::new(&self.program)
            .args(&self.args)
            .current_dir(destination_root)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| self.fail(format!("could not start '{}': {e}", self.program)))?;

        if !status.success() {
            return Err(self.fail(format!("'{}' exited with {status}", self.program)));
        }
        Ok(())
    }

    fn runs_external_command(&self) -> bool {
        true
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.on_failure
    }
}

impl CommandHook {
    fn fail(&self, reason: String) -> Error {
        Error::PostHook { hook: self.name.clone(), reason }
    }
}

/// Document written to a hook script's stdin.
#[derive(Serialize)]
pub struct Output<'a> {
    pub template_dir: &'a str,
    pub output_dir: Option<&'a str>,
    pub context: &'a Context,
}

/// Executes a template-supplied script, passing the context as JSON on stdin.
///
/// As a pre hook, a JSON object printed on stdout overrides context values.
#[derive(Debug, Clone)]
pub struct ScriptHook {
    pub script: PathBuf,
    pub template_dir: PathBuf,
    pub on_failure: FailurePolicy,
}

impl ScriptHook {
    pub fn new<S: Into<PathBuf>, T: Into<PathBuf>>(script: S, template_dir: T) -> Self {
        Self { script: script.into(), template_dir: template_dir.into(), on_failure: FailurePolicy::Abort }
    }

    fn execute(&self, output_dir: Option<&Path>, context: &Context) -> std::result::Result<Vec<u8>, String> {
        let template_dir = self.template_dir.display().to_string();
        let output_dir_str = output_dir.map(|p| p.display().to_string());
        let document = Output {
            template_dir: &template_dir,
            output_dir: output_dir_str.as_deref(),
            context,
        };
        let payload = serde_json::to_vec(&document).map_err(|e| e.to_string())?;

        let mut child = Command::new(&self.script)
            .current_dir(output_dir.unwrap_or(&self.template_dir))
            .stdin(Stdio::piped())
            .stdout(if output_dir.is_none() { Stdio::piped() } else { Stdio::inherit() })
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| format!("could not start '{}': {e}", self.script.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).map_err(|e| e.to_string())?;
        }

        let output = child.wait_with_output().map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(format!("'{}' exited with {}", self.script.display(), output.status));
        }
        Ok(output.stdout)
    }

    fn hook_name(&self) -> &str {
        self.script.file_name().and_then(|n| n.to_str()).unwrap_or("script")
    }
}

impl PreHook for ScriptHook {
    fn name(&self) -> &str {
        self.hook_name()
    }

    fn run(&self, mut context: Context) -> Result<Context> {
        let reject =
            |reason: String| Error::PreHookValidation { hook: self.hook_name().to_string(), reason };
        let stdout = self.execute(None, &context).map_err(reject)?;
        let text = String::from_utf8_lossy(&stdout);
        if text.trim().is_empty() {
            return Ok(context);
        }
        match serde_json::from_str::<serde_json::Value>(text.trim()) {
            Ok(serde_json::Value::Object(overrides)) => {
                for (key, value) in overrides {
                    debug!("Pre hook set '{key}' to {value}");
                    context.set(key, value);
                }
                Ok(context)
            }
            Ok(other) => Err(reject(format!("expected a JSON object on stdout, found {other}"))),
            Err(e) => Err(reject(format!("stdout is not valid JSON: {e}"))),
        }
    }

    fn runs_external_command(&self) -> bool {
        true
    }
}

impl PostHook for ScriptHook {
    fn name(&self) -> &str {
        self.hook_name()
    }

    fn run(&self, destination_root: &Path, context: &Context) -> Result<()> {
        self.execute(Some(destination_root), context)
            .map(|_| ())
            .map_err(|reason| Error::PostHook { hook: self.hook_name().to_string(), reason })
    }

    fn runs_external_command(&self) -> bool {
        true
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.on_failure
    }
}

/// Restricts a generator-wide hook to some templates.
///
/// Exclusions are checked first; an empty inclusion list matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookFilter {
    #[serde(default)]
    pub template_names: Vec<String>,
    #[serde(default)]
    pub template_groups: Vec<String>,
    #[serde(default)]
    pub exclude_names: Vec<String>,
    #[serde(default)]
    pub exclude_groups: Vec<String>,
}

impl HookFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_groups<S: Into<String>>(groups: impl IntoIterator<Item = S>) -> Self {
        Self { template_groups: groups.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    pub fn should_run(&self, template_name: &str, template_group: Option<&str>) -> bool {
        let in_group = |groups: &[String]| template_group.is_some_and(|g| groups.iter().any(|x| x == g));

        if self.exclude_names.iter().any(|n| n == template_name) || in_group(&self.exclude_groups) {
            return false;
        }
        if !self.template_names.is_empty() && !self.template_names.iter().any(|n| n == template_name) {
            return false;
        }
        if !self.template_groups.is_empty() && !in_group(&self.template_groups) {
            return false;
        }
        true
    }
}
